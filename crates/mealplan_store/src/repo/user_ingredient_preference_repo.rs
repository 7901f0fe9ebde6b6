//! Per-user ingredient preferences and allergies.
//!
//! # Invariants
//! - Every read and write is scoped to the owning user.
//! - A preference aimed at an ingredient group fans out to one preference per
//!   live member, all inserted in one session.

use crate::db::{run_in_session, QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    ListPage, QueryFilter, UserIngredientPreference, UserIngredientPreferenceCreationInput,
    UserIngredientPreferenceUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{bool_to_int, get_bool, get_opt_time, get_time, time_to_db};
use crate::repo::rows::{valid_ingredient_columns, valid_ingredient_from_row};
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

const PREFERENCE_FROM: &str = "user_ingredient_preferences
    INNER JOIN valid_ingredients
        ON valid_ingredients.id = user_ingredient_preferences.ingredient";

static PREFERENCE_SELECT: Lazy<String> = Lazy::new(|| {
    format!(
        "user_ingredient_preferences.id,
         user_ingredient_preferences.rating,
         user_ingredient_preferences.notes,
         user_ingredient_preferences.allergy,
         user_ingredient_preferences.belongs_to_user,
         user_ingredient_preferences.created_at,
         user_ingredient_preferences.last_updated_at,
         user_ingredient_preferences.archived_at,
         {}",
        valid_ingredient_columns("valid_ingredients", "ingredient_")
    )
});

pub trait UserIngredientPreferenceRepository {
    fn user_ingredient_preference_exists(
        &self,
        ctx: &QueryContext,
        preference_id: &str,
        user_id: &str,
    ) -> StoreResult<bool>;
    fn get_user_ingredient_preference(
        &self,
        ctx: &QueryContext,
        preference_id: &str,
        user_id: &str,
    ) -> StoreResult<UserIngredientPreference>;
    fn list_user_ingredient_preferences(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<UserIngredientPreference>>;
    /// Creates one preference, or one per member when a group is targeted.
    fn create_user_ingredient_preference(
        &self,
        ctx: &QueryContext,
        input: &UserIngredientPreferenceCreationInput,
    ) -> StoreResult<Vec<UserIngredientPreference>>;
    fn update_user_ingredient_preference(
        &self,
        ctx: &QueryContext,
        preference_id: &str,
        user_id: &str,
        input: &UserIngredientPreferenceUpdateInput,
    ) -> StoreResult<UserIngredientPreference>;
    fn archive_user_ingredient_preference(
        &self,
        ctx: &QueryContext,
        preference_id: &str,
        user_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteUserIngredientPreferenceRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteUserIngredientPreferenceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                (
                    "user_ingredient_preferences",
                    &["ingredient", "rating", "allergy", "belongs_to_user"],
                ),
                ("valid_ingredient_group_members", &["belongs_to_group", "valid_ingredient"]),
            ],
        )?;
        Ok(Self { conn, runtime })
    }
}

impl UserIngredientPreferenceRepository for SqliteUserIngredientPreferenceRepository<'_> {
    fn user_ingredient_preference_exists(
        &self,
        ctx: &QueryContext,
        preference_id: &str,
        user_id: &str,
    ) -> StoreResult<bool> {
        require_id(preference_id, "preference id")?;
        require_id(user_id, "user id")?;
        self.conn
            .read_exists(
                ctx,
                "user ingredient preference existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM user_ingredient_preferences
                    WHERE id = ?1 AND belongs_to_user = ?2 AND archived_at IS NULL
                );",
                params![preference_id, user_id],
            )
            .annotate("check user ingredient preference existence", preference_id)
    }

    fn get_user_ingredient_preference(
        &self,
        ctx: &QueryContext,
        preference_id: &str,
        user_id: &str,
    ) -> StoreResult<UserIngredientPreference> {
        require_id(preference_id, "preference id")?;
        require_id(user_id, "user id")?;
        fetch_preference(self.conn, ctx, preference_id, user_id)
            .annotate("get user ingredient preference", preference_id)
    }

    fn list_user_ingredient_preferences(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<UserIngredientPreference>> {
        require_id(user_id, "user id")?;
        let spec = ListSpec::new(
            "user_ingredient_preferences",
            PREFERENCE_SELECT.as_str(),
            PREFERENCE_FROM,
        )
        .scoped(
            "user_ingredient_preferences.belongs_to_user = ?",
            vec![Value::Text(user_id.to_string())],
        );
        list_page(self.conn, ctx, "user ingredient preference", &spec, filter, preference_from_row)
            .annotate("list user ingredient preferences", user_id)
    }

    fn create_user_ingredient_preference(
        &self,
        ctx: &QueryContext,
        input: &UserIngredientPreferenceCreationInput,
    ) -> StoreResult<Vec<UserIngredientPreference>> {
        input.validate()?;
        let user_id = input.belongs_to_user.as_str();
        let now = time_to_db(self.runtime.now());

        let created = run_in_session(self.conn, ctx, "create user ingredient preference", |session| {
            let ingredient_ids = match (&input.valid_ingredient_id, &input.valid_ingredient_group_id) {
                (Some(ingredient_id), _) if !ingredient_id.trim().is_empty() => {
                    vec![ingredient_id.clone()]
                }
                (_, Some(group_id)) => group_member_ingredients(session, ctx, group_id)?,
                _ => return Err(StoreError::invalid_input("preference target is missing")),
            };

            let mut created = Vec::with_capacity(ingredient_ids.len());
            for ingredient_id in ingredient_ids {
                let id = self.runtime.new_id();
                session.execute_write(
                    ctx,
                    "user ingredient preference creation",
                    "INSERT INTO user_ingredient_preferences (
                        id, ingredient, rating, notes, allergy, belongs_to_user, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                    params![
                        id,
                        ingredient_id,
                        input.rating,
                        input.notes,
                        bool_to_int(input.allergy),
                        user_id,
                        now,
                    ],
                )?;
                created.push(fetch_preference(session, ctx, &id, user_id)?);
            }
            Ok(created)
        })
        .annotate("create user ingredient preference", user_id)?;

        info!(
            "event=user_ingredient_preference_create module=repo status=ok user_id={user_id} count={}",
            created.len()
        );
        Ok(created)
    }

    fn update_user_ingredient_preference(
        &self,
        ctx: &QueryContext,
        preference_id: &str,
        user_id: &str,
        input: &UserIngredientPreferenceUpdateInput,
    ) -> StoreResult<UserIngredientPreference> {
        require_id(preference_id, "preference id")?;
        require_id(user_id, "user id")?;
        let changed = self
            .conn
            .execute_write(
                ctx,
                "user ingredient preference update",
                "UPDATE user_ingredient_preferences
                 SET ingredient = COALESCE(?3, ingredient),
                     rating = COALESCE(?4, rating),
                     notes = COALESCE(?5, notes),
                     allergy = COALESCE(?6, allergy),
                     last_updated_at = ?7
                 WHERE id = ?1 AND belongs_to_user = ?2 AND archived_at IS NULL;",
                params![
                    preference_id,
                    user_id,
                    input.valid_ingredient_id,
                    input.rating,
                    input.notes,
                    input.allergy.map(bool_to_int),
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update user ingredient preference", preference_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("user ingredient preference"))
                .annotate("update user ingredient preference", preference_id);
        }
        fetch_preference(self.conn, ctx, preference_id, user_id)
            .annotate("update user ingredient preference", preference_id)
    }

    fn archive_user_ingredient_preference(
        &self,
        ctx: &QueryContext,
        preference_id: &str,
        user_id: &str,
    ) -> StoreResult<()> {
        require_id(preference_id, "preference id")?;
        require_id(user_id, "user id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "user ingredient preference archive",
                "UPDATE user_ingredient_preferences
                 SET archived_at = ?3, last_updated_at = ?3
                 WHERE id = ?1 AND belongs_to_user = ?2 AND archived_at IS NULL;",
                params![preference_id, user_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive user ingredient preference", preference_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("user ingredient preference"))
                .annotate("archive user ingredient preference", preference_id);
        }
        Ok(())
    }
}

fn group_member_ingredients<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    group_id: &str,
) -> StoreResult<Vec<String>> {
    let group_exists = exec.read_exists(
        ctx,
        "valid ingredient group existence",
        "SELECT EXISTS (
            SELECT 1 FROM valid_ingredient_groups WHERE id = ?1 AND archived_at IS NULL
        );",
        [group_id],
    )?;
    if !group_exists {
        return Err(StoreError::NotFound("valid ingredient group"));
    }

    let members = exec.read_many(
        ctx,
        "valid ingredient group member",
        "SELECT valid_ingredient
         FROM valid_ingredient_group_members
         WHERE belongs_to_group = ?1 AND archived_at IS NULL
         ORDER BY created_at ASC, id ASC;",
        [group_id],
        |row| Ok(row.get::<_, String>("valid_ingredient")?),
    )?;
    if members.is_empty() {
        return Err(StoreError::invalid_input(format!(
            "valid ingredient group {group_id} has no members"
        )));
    }
    Ok(members)
}

fn fetch_preference<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    preference_id: &str,
    user_id: &str,
) -> StoreResult<UserIngredientPreference> {
    let sql = format!(
        "SELECT {}
         FROM {PREFERENCE_FROM}
         WHERE user_ingredient_preferences.id = ?1
           AND user_ingredient_preferences.belongs_to_user = ?2
           AND user_ingredient_preferences.archived_at IS NULL;",
        PREFERENCE_SELECT.as_str()
    );
    exec.read_one(
        ctx,
        "user ingredient preference",
        &sql,
        params![preference_id, user_id],
        preference_from_row,
    )
}

fn preference_from_row(row: &Row<'_>) -> StoreResult<UserIngredientPreference> {
    Ok(UserIngredientPreference {
        id: row.get("id")?,
        ingredient: valid_ingredient_from_row(row, "ingredient_")?,
        rating: row.get("rating")?,
        notes: row.get("notes")?,
        allergy: get_bool(row, "allergy")?,
        belongs_to_user: row.get("belongs_to_user")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
