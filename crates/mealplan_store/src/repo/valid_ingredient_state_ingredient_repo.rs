//! States an ingredient can be in (melted butter, ripe banana).

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    ListPage, QueryFilter, ValidIngredientStateIngredient,
    ValidIngredientStateIngredientCreationInput, ValidIngredientStateIngredientUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{get_opt_time, get_time, time_to_db};
use crate::repo::rows::{
    valid_ingredient_columns, valid_ingredient_from_row, valid_ingredient_state_columns,
    valid_ingredient_state_from_row,
};
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

const STATE_INGREDIENT_FROM: &str = "valid_ingredient_state_ingredients
    INNER JOIN valid_ingredient_states
        ON valid_ingredient_states.id = valid_ingredient_state_ingredients.valid_ingredient_state
    INNER JOIN valid_ingredients
        ON valid_ingredients.id = valid_ingredient_state_ingredients.valid_ingredient";

static STATE_INGREDIENT_SELECT: Lazy<String> = Lazy::new(|| {
    format!(
        "valid_ingredient_state_ingredients.id,
         valid_ingredient_state_ingredients.notes,
         valid_ingredient_state_ingredients.created_at,
         valid_ingredient_state_ingredients.last_updated_at,
         valid_ingredient_state_ingredients.archived_at,
         {},
         {}",
        valid_ingredient_state_columns("valid_ingredient_states", "state_"),
        valid_ingredient_columns("valid_ingredients", "ingredient_")
    )
});

pub trait ValidIngredientStateIngredientRepository {
    fn valid_ingredient_state_ingredient_exists(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<bool>;
    fn get_valid_ingredient_state_ingredient(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<ValidIngredientStateIngredient>;
    fn list_valid_ingredient_state_ingredients(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientStateIngredient>>;
    fn list_valid_ingredient_state_ingredients_for_state(
        &self,
        ctx: &QueryContext,
        state_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientStateIngredient>>;
    fn list_valid_ingredient_state_ingredients_for_ingredient(
        &self,
        ctx: &QueryContext,
        ingredient_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientStateIngredient>>;
    fn create_valid_ingredient_state_ingredient(
        &self,
        ctx: &QueryContext,
        input: &ValidIngredientStateIngredientCreationInput,
    ) -> StoreResult<ValidIngredientStateIngredient>;
    fn update_valid_ingredient_state_ingredient(
        &self,
        ctx: &QueryContext,
        link_id: &str,
        input: &ValidIngredientStateIngredientUpdateInput,
    ) -> StoreResult<ValidIngredientStateIngredient>;
    fn archive_valid_ingredient_state_ingredient(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteValidIngredientStateIngredientRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteValidIngredientStateIngredientRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                (
                    "valid_ingredient_state_ingredients",
                    &["notes", "valid_ingredient_state", "valid_ingredient"],
                ),
                ("valid_ingredient_states", &["attribute_type"]),
            ],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<ValidIngredientStateIngredient> {
        let sql = format!(
            "SELECT {}
             FROM {STATE_INGREDIENT_FROM}
             WHERE valid_ingredient_state_ingredients.id = ?1
               AND valid_ingredient_state_ingredients.archived_at IS NULL;",
            STATE_INGREDIENT_SELECT.as_str()
        );
        self.conn.read_one(
            ctx,
            "valid ingredient state ingredient",
            &sql,
            [link_id],
            state_ingredient_from_row,
        )
    }

    fn list_where(
        &self,
        ctx: &QueryContext,
        scope: &'static str,
        scope_params: Vec<Value>,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientStateIngredient>> {
        let spec = ListSpec::new(
            "valid_ingredient_state_ingredients",
            STATE_INGREDIENT_SELECT.as_str(),
            STATE_INGREDIENT_FROM,
        )
        .scoped(scope, scope_params);
        list_page(
            self.conn,
            ctx,
            "valid ingredient state ingredient",
            &spec,
            filter,
            state_ingredient_from_row,
        )
    }
}

impl ValidIngredientStateIngredientRepository
    for SqliteValidIngredientStateIngredientRepository<'_>
{
    fn valid_ingredient_state_ingredient_exists(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<bool> {
        require_id(link_id, "valid ingredient state ingredient id")?;
        self.conn
            .read_exists(
                ctx,
                "valid ingredient state ingredient existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM valid_ingredient_state_ingredients
                    WHERE id = ?1 AND archived_at IS NULL
                );",
                [link_id],
            )
            .annotate("check valid ingredient state ingredient existence", link_id)
    }

    fn get_valid_ingredient_state_ingredient(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<ValidIngredientStateIngredient> {
        require_id(link_id, "valid ingredient state ingredient id")?;
        self.fetch(ctx, link_id)
            .annotate("get valid ingredient state ingredient", link_id)
    }

    fn list_valid_ingredient_state_ingredients(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientStateIngredient>> {
        self.list_where(ctx, "", Vec::new(), filter)
            .annotate("list valid ingredient state ingredients", "*")
    }

    fn list_valid_ingredient_state_ingredients_for_state(
        &self,
        ctx: &QueryContext,
        state_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientStateIngredient>> {
        require_id(state_id, "valid ingredient state id")?;
        self.list_where(
            ctx,
            "valid_ingredient_state_ingredients.valid_ingredient_state = ?",
            vec![Value::Text(state_id.to_string())],
            filter,
        )
        .annotate("list valid ingredient state ingredients for state", state_id)
    }

    fn list_valid_ingredient_state_ingredients_for_ingredient(
        &self,
        ctx: &QueryContext,
        ingredient_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientStateIngredient>> {
        require_id(ingredient_id, "valid ingredient id")?;
        self.list_where(
            ctx,
            "valid_ingredient_state_ingredients.valid_ingredient = ?",
            vec![Value::Text(ingredient_id.to_string())],
            filter,
        )
        .annotate("list valid ingredient state ingredients for ingredient", ingredient_id)
    }

    fn create_valid_ingredient_state_ingredient(
        &self,
        ctx: &QueryContext,
        input: &ValidIngredientStateIngredientCreationInput,
    ) -> StoreResult<ValidIngredientStateIngredient> {
        require_id(&input.id, "valid ingredient state ingredient id")?;
        require_id(&input.valid_ingredient_state_id, "valid ingredient state id")?;
        require_id(&input.valid_ingredient_id, "valid ingredient id")?;
        self.conn
            .execute_write(
                ctx,
                "valid ingredient state ingredient creation",
                "INSERT INTO valid_ingredient_state_ingredients (
                    id, notes, valid_ingredient_state, valid_ingredient, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    input.id,
                    input.notes,
                    input.valid_ingredient_state_id,
                    input.valid_ingredient_id,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("create valid ingredient state ingredient", &input.id)?;
        info!(
            "event=valid_ingredient_state_ingredient_create module=repo status=ok id={}",
            input.id
        );
        self.fetch(ctx, &input.id)
            .annotate("create valid ingredient state ingredient", &input.id)
    }

    fn update_valid_ingredient_state_ingredient(
        &self,
        ctx: &QueryContext,
        link_id: &str,
        input: &ValidIngredientStateIngredientUpdateInput,
    ) -> StoreResult<ValidIngredientStateIngredient> {
        require_id(link_id, "valid ingredient state ingredient id")?;
        let changed = self
            .conn
            .execute_write(
                ctx,
                "valid ingredient state ingredient update",
                "UPDATE valid_ingredient_state_ingredients
                 SET notes = COALESCE(?2, notes),
                     valid_ingredient_state = COALESCE(?3, valid_ingredient_state),
                     valid_ingredient = COALESCE(?4, valid_ingredient),
                     last_updated_at = ?5
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    link_id,
                    input.notes,
                    input.valid_ingredient_state_id,
                    input.valid_ingredient_id,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update valid ingredient state ingredient", link_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("valid ingredient state ingredient"))
                .annotate("update valid ingredient state ingredient", link_id);
        }
        self.fetch(ctx, link_id)
            .annotate("update valid ingredient state ingredient", link_id)
    }

    fn archive_valid_ingredient_state_ingredient(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<()> {
        require_id(link_id, "valid ingredient state ingredient id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "valid ingredient state ingredient archive",
                "UPDATE valid_ingredient_state_ingredients
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![link_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive valid ingredient state ingredient", link_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("valid ingredient state ingredient"))
                .annotate("archive valid ingredient state ingredient", link_id);
        }
        Ok(())
    }
}

fn state_ingredient_from_row(row: &Row<'_>) -> StoreResult<ValidIngredientStateIngredient> {
    Ok(ValidIngredientStateIngredient {
        id: row.get("id")?,
        notes: row.get("notes")?,
        ingredient_state: valid_ingredient_state_from_row(row, "state_")?,
        ingredient: valid_ingredient_from_row(row, "ingredient_")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
