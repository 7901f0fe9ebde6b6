//! Valid ingredient groups and their members.
//!
//! # Invariants
//! - A group and all of its members are written in one session.
//! - `(group, ingredient)` is unique among live members.
//! - Archiving a group archives its members.

use crate::db::{run_in_session, QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    validate_slug, ListPage, QueryFilter, ValidIngredientGroup, ValidIngredientGroupCreationInput,
    ValidIngredientGroupMember, ValidIngredientGroupUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{get_opt_time, get_time, time_to_db};
use crate::repo::rows::{valid_ingredient_columns, valid_ingredient_from_row};
use crate::runtime::StoreRuntime;
use log::info;
use rusqlite::{params, Connection, Row};

/// Upper bound on rows returned by a name search.
pub const SEARCH_RESULT_LIMIT: u32 = 50;

const GROUP_COLUMNS: &str = "valid_ingredient_groups.id,
    valid_ingredient_groups.name,
    valid_ingredient_groups.slug,
    valid_ingredient_groups.description,
    valid_ingredient_groups.created_at,
    valid_ingredient_groups.last_updated_at,
    valid_ingredient_groups.archived_at";

pub trait ValidIngredientGroupRepository {
    fn valid_ingredient_group_exists(&self, ctx: &QueryContext, group_id: &str)
        -> StoreResult<bool>;
    fn get_valid_ingredient_group(
        &self,
        ctx: &QueryContext,
        group_id: &str,
    ) -> StoreResult<ValidIngredientGroup>;
    fn list_valid_ingredient_groups(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientGroup>>;
    /// Case-insensitive substring match on the group name.
    fn search_valid_ingredient_groups(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> StoreResult<Vec<ValidIngredientGroup>>;
    fn create_valid_ingredient_group(
        &self,
        ctx: &QueryContext,
        input: &ValidIngredientGroupCreationInput,
    ) -> StoreResult<ValidIngredientGroup>;
    fn update_valid_ingredient_group(
        &self,
        ctx: &QueryContext,
        group_id: &str,
        input: &ValidIngredientGroupUpdateInput,
    ) -> StoreResult<ValidIngredientGroup>;
    fn archive_valid_ingredient_group(&self, ctx: &QueryContext, group_id: &str)
        -> StoreResult<()>;
}

pub struct SqliteValidIngredientGroupRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteValidIngredientGroupRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("valid_ingredient_groups", &["name", "slug", "description"]),
                ("valid_ingredient_group_members", &["belongs_to_group", "valid_ingredient"]),
            ],
        )?;
        Ok(Self { conn, runtime })
    }
}

impl ValidIngredientGroupRepository for SqliteValidIngredientGroupRepository<'_> {
    fn valid_ingredient_group_exists(
        &self,
        ctx: &QueryContext,
        group_id: &str,
    ) -> StoreResult<bool> {
        require_id(group_id, "valid ingredient group id")?;
        self.conn
            .read_exists(
                ctx,
                "valid ingredient group existence",
                "SELECT EXISTS (
                    SELECT 1 FROM valid_ingredient_groups WHERE id = ?1 AND archived_at IS NULL
                );",
                [group_id],
            )
            .annotate("check valid ingredient group existence", group_id)
    }

    fn get_valid_ingredient_group(
        &self,
        ctx: &QueryContext,
        group_id: &str,
    ) -> StoreResult<ValidIngredientGroup> {
        require_id(group_id, "valid ingredient group id")?;
        fetch_group(self.conn, ctx, group_id).annotate("get valid ingredient group", group_id)
    }

    fn list_valid_ingredient_groups(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientGroup>> {
        let spec = ListSpec::new(
            "valid_ingredient_groups",
            GROUP_COLUMNS,
            "valid_ingredient_groups",
        );
        let mut page = list_page(self.conn, ctx, "valid ingredient group", &spec, filter, group_from_row)
            .annotate("list valid ingredient groups", "*")?;
        for group in &mut page.items {
            group.members = fetch_members(self.conn, ctx, &group.id)
                .annotate("list valid ingredient groups", &group.id)?;
        }
        Ok(page)
    }

    fn search_valid_ingredient_groups(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> StoreResult<Vec<ValidIngredientGroup>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StoreError::invalid_input("search query must not be empty"));
        }
        let sql = format!(
            "SELECT {GROUP_COLUMNS}
             FROM valid_ingredient_groups
             WHERE valid_ingredient_groups.name LIKE '%' || ?1 || '%'
               AND valid_ingredient_groups.archived_at IS NULL
             ORDER BY valid_ingredient_groups.name ASC, valid_ingredient_groups.id ASC
             LIMIT ?2;"
        );
        let mut groups = self
            .conn
            .read_many(
                ctx,
                "valid ingredient group",
                &sql,
                params![query, SEARCH_RESULT_LIMIT],
                group_from_row,
            )
            .annotate("search valid ingredient groups", query)?;
        for group in &mut groups {
            group.members = fetch_members(self.conn, ctx, &group.id)
                .annotate("search valid ingredient groups", &group.id)?;
        }
        Ok(groups)
    }

    fn create_valid_ingredient_group(
        &self,
        ctx: &QueryContext,
        input: &ValidIngredientGroupCreationInput,
    ) -> StoreResult<ValidIngredientGroup> {
        input.validate()?;
        let now = time_to_db(self.runtime.now());

        let group = run_in_session(self.conn, ctx, "create valid ingredient group", |session| {
            session.execute_write(
                ctx,
                "valid ingredient group creation",
                "INSERT INTO valid_ingredient_groups (id, name, slug, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![input.id, input.name, input.slug, input.description, now],
            )?;
            for member in &input.members {
                session.execute_write(
                    ctx,
                    "valid ingredient group member creation",
                    "INSERT INTO valid_ingredient_group_members (
                        id, belongs_to_group, valid_ingredient, created_at
                    ) VALUES (?1, ?2, ?3, ?4);",
                    params![member.id, input.id, member.valid_ingredient_id, now],
                )?;
            }
            fetch_group(session, ctx, &input.id)
        })
        .annotate("create valid ingredient group", &input.id)?;

        info!(
            "event=valid_ingredient_group_create module=repo status=ok id={} members={}",
            group.id,
            group.members.len()
        );
        Ok(group)
    }

    fn update_valid_ingredient_group(
        &self,
        ctx: &QueryContext,
        group_id: &str,
        input: &ValidIngredientGroupUpdateInput,
    ) -> StoreResult<ValidIngredientGroup> {
        require_id(group_id, "valid ingredient group id")?;
        if let Some(slug) = &input.slug {
            validate_slug(slug)?;
        }
        let changed = self
            .conn
            .execute_write(
                ctx,
                "valid ingredient group update",
                "UPDATE valid_ingredient_groups
                 SET name = COALESCE(?2, name),
                     slug = COALESCE(?3, slug),
                     description = COALESCE(?4, description),
                     last_updated_at = ?5
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    group_id,
                    input.name,
                    input.slug,
                    input.description,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update valid ingredient group", group_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("valid ingredient group"))
                .annotate("update valid ingredient group", group_id);
        }
        fetch_group(self.conn, ctx, group_id).annotate("update valid ingredient group", group_id)
    }

    fn archive_valid_ingredient_group(
        &self,
        ctx: &QueryContext,
        group_id: &str,
    ) -> StoreResult<()> {
        require_id(group_id, "valid ingredient group id")?;
        let now = time_to_db(self.runtime.now());
        run_in_session(self.conn, ctx, "archive valid ingredient group", |session| {
            let archived = session.execute_write(
                ctx,
                "valid ingredient group archive",
                "UPDATE valid_ingredient_groups
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![group_id, now],
            )?;
            if archived == 0 {
                return Err(StoreError::NotFound("valid ingredient group"));
            }
            session.execute_write(
                ctx,
                "valid ingredient group member archive",
                "UPDATE valid_ingredient_group_members
                 SET archived_at = ?2
                 WHERE belongs_to_group = ?1 AND archived_at IS NULL;",
                params![group_id, now],
            )?;
            Ok(())
        })
        .annotate("archive valid ingredient group", group_id)?;

        info!("event=valid_ingredient_group_archive module=repo status=ok id={group_id}");
        Ok(())
    }
}

fn fetch_group<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    group_id: &str,
) -> StoreResult<ValidIngredientGroup> {
    let sql = format!(
        "SELECT {GROUP_COLUMNS}
         FROM valid_ingredient_groups
         WHERE valid_ingredient_groups.id = ?1
           AND valid_ingredient_groups.archived_at IS NULL;"
    );
    let mut group = exec.read_one(ctx, "valid ingredient group", &sql, [group_id], group_from_row)?;
    group.members = fetch_members(exec, ctx, group_id)?;
    Ok(group)
}

fn fetch_members<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    group_id: &str,
) -> StoreResult<Vec<ValidIngredientGroupMember>> {
    let sql = format!(
        "SELECT
            valid_ingredient_group_members.id,
            valid_ingredient_group_members.belongs_to_group,
            valid_ingredient_group_members.created_at,
            valid_ingredient_group_members.archived_at,
            {}
         FROM valid_ingredient_group_members
         INNER JOIN valid_ingredients
             ON valid_ingredients.id = valid_ingredient_group_members.valid_ingredient
         WHERE valid_ingredient_group_members.belongs_to_group = ?1
           AND valid_ingredient_group_members.archived_at IS NULL
         ORDER BY valid_ingredient_group_members.created_at ASC,
                  valid_ingredient_group_members.id ASC;",
        valid_ingredient_columns("valid_ingredients", "ingredient_")
    );
    exec.read_many(ctx, "valid ingredient group member", &sql, [group_id], |row| {
        Ok(ValidIngredientGroupMember {
            id: row.get("id")?,
            belongs_to_group: row.get("belongs_to_group")?,
            valid_ingredient: valid_ingredient_from_row(row, "ingredient_")?,
            created_at: get_time(row, "created_at")?,
            archived_at: get_opt_time(row, "archived_at")?,
        })
    })
}

fn group_from_row(row: &Row<'_>) -> StoreResult<ValidIngredientGroup> {
    Ok(ValidIngredientGroup {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        description: row.get("description")?,
        members: Vec::new(),
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
