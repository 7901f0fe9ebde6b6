//! Which preparations apply to which ingredients.
//!
//! Records are returned with both sides hydrated, including sides that have
//! since been archived.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    ListPage, QueryFilter, ValidIngredientPreparation, ValidIngredientPreparationCreationInput,
    ValidIngredientPreparationUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{get_opt_time, get_time, time_to_db};
use crate::repo::rows::{
    valid_ingredient_columns, valid_ingredient_from_row, valid_preparation_columns,
    valid_preparation_from_row,
};
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

const LINK_FROM: &str = "valid_ingredient_preparations
    INNER JOIN valid_preparations
        ON valid_preparations.id = valid_ingredient_preparations.valid_preparation_id
    INNER JOIN valid_ingredients
        ON valid_ingredients.id = valid_ingredient_preparations.valid_ingredient_id";

static LINK_SELECT: Lazy<String> = Lazy::new(|| {
    format!(
        "valid_ingredient_preparations.id,
         valid_ingredient_preparations.notes,
         valid_ingredient_preparations.created_at,
         valid_ingredient_preparations.last_updated_at,
         valid_ingredient_preparations.archived_at,
         {},
         {}",
        valid_preparation_columns("valid_preparations", "preparation_"),
        valid_ingredient_columns("valid_ingredients", "ingredient_")
    )
});

pub trait ValidIngredientPreparationRepository {
    fn valid_ingredient_preparation_exists(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<bool>;
    fn get_valid_ingredient_preparation(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<ValidIngredientPreparation>;
    fn list_valid_ingredient_preparations(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientPreparation>>;
    fn list_valid_ingredient_preparations_for_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientPreparation>>;
    fn list_valid_ingredient_preparations_for_ingredient(
        &self,
        ctx: &QueryContext,
        ingredient_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientPreparation>>;
    fn create_valid_ingredient_preparation(
        &self,
        ctx: &QueryContext,
        input: &ValidIngredientPreparationCreationInput,
    ) -> StoreResult<ValidIngredientPreparation>;
    fn update_valid_ingredient_preparation(
        &self,
        ctx: &QueryContext,
        link_id: &str,
        input: &ValidIngredientPreparationUpdateInput,
    ) -> StoreResult<ValidIngredientPreparation>;
    fn archive_valid_ingredient_preparation(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteValidIngredientPreparationRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteValidIngredientPreparationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                (
                    "valid_ingredient_preparations",
                    &["notes", "valid_preparation_id", "valid_ingredient_id"],
                ),
                ("valid_preparations", &["slug"]),
                ("valid_ingredients", &["slug"]),
            ],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch(&self, ctx: &QueryContext, link_id: &str) -> StoreResult<ValidIngredientPreparation> {
        let sql = format!(
            "SELECT {}
             FROM {LINK_FROM}
             WHERE valid_ingredient_preparations.id = ?1
               AND valid_ingredient_preparations.archived_at IS NULL;",
            LINK_SELECT.as_str()
        );
        self.conn.read_one(
            ctx,
            "valid ingredient preparation",
            &sql,
            [link_id],
            link_from_row,
        )
    }

    fn list_scoped(
        &self,
        ctx: &QueryContext,
        scope: Option<(&'static str, &str)>,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientPreparation>> {
        let mut spec = ListSpec::new(
            "valid_ingredient_preparations",
            LINK_SELECT.as_str(),
            LINK_FROM,
        );
        if let Some((predicate, id)) = scope {
            spec = spec.scoped(predicate, vec![Value::Text(id.to_string())]);
        }
        list_page(
            self.conn,
            ctx,
            "valid ingredient preparation",
            &spec,
            filter,
            link_from_row,
        )
    }
}

impl ValidIngredientPreparationRepository for SqliteValidIngredientPreparationRepository<'_> {
    fn valid_ingredient_preparation_exists(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<bool> {
        require_id(link_id, "valid ingredient preparation id")?;
        self.conn
            .read_exists(
                ctx,
                "valid ingredient preparation existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM valid_ingredient_preparations
                    WHERE id = ?1 AND archived_at IS NULL
                );",
                [link_id],
            )
            .annotate("check valid ingredient preparation existence", link_id)
    }

    fn get_valid_ingredient_preparation(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<ValidIngredientPreparation> {
        require_id(link_id, "valid ingredient preparation id")?;
        self.fetch(ctx, link_id)
            .annotate("get valid ingredient preparation", link_id)
    }

    fn list_valid_ingredient_preparations(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientPreparation>> {
        self.list_scoped(ctx, None, filter)
            .annotate("list valid ingredient preparations", "*")
    }

    fn list_valid_ingredient_preparations_for_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientPreparation>> {
        require_id(preparation_id, "valid preparation id")?;
        self.list_scoped(
            ctx,
            Some((
                "valid_ingredient_preparations.valid_preparation_id = ?",
                preparation_id,
            )),
            filter,
        )
        .annotate("list valid ingredient preparations for preparation", preparation_id)
    }

    fn list_valid_ingredient_preparations_for_ingredient(
        &self,
        ctx: &QueryContext,
        ingredient_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientPreparation>> {
        require_id(ingredient_id, "valid ingredient id")?;
        self.list_scoped(
            ctx,
            Some((
                "valid_ingredient_preparations.valid_ingredient_id = ?",
                ingredient_id,
            )),
            filter,
        )
        .annotate("list valid ingredient preparations for ingredient", ingredient_id)
    }

    fn create_valid_ingredient_preparation(
        &self,
        ctx: &QueryContext,
        input: &ValidIngredientPreparationCreationInput,
    ) -> StoreResult<ValidIngredientPreparation> {
        require_id(&input.id, "valid ingredient preparation id")?;
        require_id(&input.valid_preparation_id, "valid preparation id")?;
        require_id(&input.valid_ingredient_id, "valid ingredient id")?;
        self.conn
            .execute_write(
                ctx,
                "valid ingredient preparation creation",
                "INSERT INTO valid_ingredient_preparations (
                    id, notes, valid_preparation_id, valid_ingredient_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    input.id,
                    input.notes,
                    input.valid_preparation_id,
                    input.valid_ingredient_id,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("create valid ingredient preparation", &input.id)?;
        info!(
            "event=valid_ingredient_preparation_create module=repo status=ok id={} preparation_id={} ingredient_id={}",
            input.id, input.valid_preparation_id, input.valid_ingredient_id
        );
        self.fetch(ctx, &input.id)
            .annotate("create valid ingredient preparation", &input.id)
    }

    fn update_valid_ingredient_preparation(
        &self,
        ctx: &QueryContext,
        link_id: &str,
        input: &ValidIngredientPreparationUpdateInput,
    ) -> StoreResult<ValidIngredientPreparation> {
        require_id(link_id, "valid ingredient preparation id")?;
        let changed = self
            .conn
            .execute_write(
                ctx,
                "valid ingredient preparation update",
                "UPDATE valid_ingredient_preparations
                 SET notes = COALESCE(?2, notes),
                     valid_preparation_id = COALESCE(?3, valid_preparation_id),
                     valid_ingredient_id = COALESCE(?4, valid_ingredient_id),
                     last_updated_at = ?5
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    link_id,
                    input.notes,
                    input.valid_preparation_id,
                    input.valid_ingredient_id,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update valid ingredient preparation", link_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("valid ingredient preparation"))
                .annotate("update valid ingredient preparation", link_id);
        }
        self.fetch(ctx, link_id)
            .annotate("update valid ingredient preparation", link_id)
    }

    fn archive_valid_ingredient_preparation(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<()> {
        require_id(link_id, "valid ingredient preparation id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "valid ingredient preparation archive",
                "UPDATE valid_ingredient_preparations
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![link_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive valid ingredient preparation", link_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("valid ingredient preparation"))
                .annotate("archive valid ingredient preparation", link_id);
        }
        Ok(())
    }
}

fn link_from_row(row: &Row<'_>) -> StoreResult<ValidIngredientPreparation> {
    Ok(ValidIngredientPreparation {
        id: row.get("id")?,
        notes: row.get("notes")?,
        preparation: valid_preparation_from_row(row, "preparation_")?,
        ingredient: valid_ingredient_from_row(row, "ingredient_")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
