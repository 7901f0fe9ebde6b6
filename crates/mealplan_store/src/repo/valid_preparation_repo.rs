//! Canonical preparations (dice, sear, rest, ...).

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    validate_count_range, validate_slug, ListPage, QueryFilter, ValidPreparation,
    ValidPreparationCreationInput, ValidPreparationUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{bool_to_int, time_to_db};
use crate::repo::rows::{valid_preparation_columns, valid_preparation_from_row};
use crate::repo::valid_ingredient_group_repo::SEARCH_RESULT_LIMIT;
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::{params, Connection};

static PREPARATION_COLUMNS: Lazy<String> =
    Lazy::new(|| valid_preparation_columns("valid_preparations", ""));

pub trait ValidPreparationRepository {
    fn valid_preparation_exists(&self, ctx: &QueryContext, preparation_id: &str)
        -> StoreResult<bool>;
    fn get_valid_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
    ) -> StoreResult<ValidPreparation>;
    fn list_valid_preparations(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparation>>;
    fn search_valid_preparations(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> StoreResult<Vec<ValidPreparation>>;
    fn create_valid_preparation(
        &self,
        ctx: &QueryContext,
        input: &ValidPreparationCreationInput,
    ) -> StoreResult<ValidPreparation>;
    fn update_valid_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
        input: &ValidPreparationUpdateInput,
    ) -> StoreResult<ValidPreparation>;
    fn archive_valid_preparation(&self, ctx: &QueryContext, preparation_id: &str)
        -> StoreResult<()>;
}

pub struct SqliteValidPreparationRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteValidPreparationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[(
                "valid_preparations",
                &["slug", "minimum_ingredient_count", "maximum_instrument_count"],
            )],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch(&self, ctx: &QueryContext, preparation_id: &str) -> StoreResult<ValidPreparation> {
        let sql = format!(
            "SELECT {}
             FROM valid_preparations
             WHERE valid_preparations.id = ?1 AND valid_preparations.archived_at IS NULL;",
            PREPARATION_COLUMNS.as_str()
        );
        self.conn.read_one(ctx, "valid preparation", &sql, [preparation_id], |row| {
            valid_preparation_from_row(row, "")
        })
    }
}

impl ValidPreparationRepository for SqliteValidPreparationRepository<'_> {
    fn valid_preparation_exists(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
    ) -> StoreResult<bool> {
        require_id(preparation_id, "valid preparation id")?;
        self.conn
            .read_exists(
                ctx,
                "valid preparation existence",
                "SELECT EXISTS (
                    SELECT 1 FROM valid_preparations WHERE id = ?1 AND archived_at IS NULL
                );",
                [preparation_id],
            )
            .annotate("check valid preparation existence", preparation_id)
    }

    fn get_valid_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
    ) -> StoreResult<ValidPreparation> {
        require_id(preparation_id, "valid preparation id")?;
        self.fetch(ctx, preparation_id)
            .annotate("get valid preparation", preparation_id)
    }

    fn list_valid_preparations(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparation>> {
        let spec = ListSpec::new(
            "valid_preparations",
            PREPARATION_COLUMNS.as_str(),
            "valid_preparations",
        );
        list_page(self.conn, ctx, "valid preparation", &spec, filter, |row| {
            valid_preparation_from_row(row, "")
        })
        .annotate("list valid preparations", "*")
    }

    fn search_valid_preparations(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> StoreResult<Vec<ValidPreparation>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StoreError::invalid_input("search query must not be empty"));
        }
        let sql = format!(
            "SELECT {}
             FROM valid_preparations
             WHERE valid_preparations.name LIKE '%' || ?1 || '%'
               AND valid_preparations.archived_at IS NULL
             ORDER BY valid_preparations.name ASC, valid_preparations.id ASC
             LIMIT ?2;",
            PREPARATION_COLUMNS.as_str()
        );
        self.conn
            .read_many(
                ctx,
                "valid preparation",
                &sql,
                params![query, SEARCH_RESULT_LIMIT],
                |row| valid_preparation_from_row(row, ""),
            )
            .annotate("search valid preparations", query)
    }

    fn create_valid_preparation(
        &self,
        ctx: &QueryContext,
        input: &ValidPreparationCreationInput,
    ) -> StoreResult<ValidPreparation> {
        input.validate()?;
        self.conn
            .execute_write(
                ctx,
                "valid preparation creation",
                "INSERT INTO valid_preparations (
                    id,
                    name,
                    description,
                    icon_path,
                    past_tense,
                    slug,
                    yields_nothing,
                    restrict_to_ingredients,
                    minimum_ingredient_count,
                    maximum_ingredient_count,
                    minimum_instrument_count,
                    maximum_instrument_count,
                    temperature_required,
                    time_estimate_required,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
                params![
                    input.id,
                    input.name,
                    input.description,
                    input.icon_path,
                    input.past_tense,
                    input.slug,
                    bool_to_int(input.yields_nothing),
                    bool_to_int(input.restrict_to_ingredients),
                    input.minimum_ingredient_count,
                    input.maximum_ingredient_count,
                    input.minimum_instrument_count,
                    input.maximum_instrument_count,
                    bool_to_int(input.temperature_required),
                    bool_to_int(input.time_estimate_required),
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("create valid preparation", &input.id)?;
        info!("event=valid_preparation_create module=repo status=ok id={}", input.id);
        self.fetch(ctx, &input.id)
            .annotate("create valid preparation", &input.id)
    }

    fn update_valid_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
        input: &ValidPreparationUpdateInput,
    ) -> StoreResult<ValidPreparation> {
        require_id(preparation_id, "valid preparation id")?;
        if let Some(slug) = &input.slug {
            validate_slug(slug)?;
        }
        let current = self
            .fetch(ctx, preparation_id)
            .annotate("update valid preparation", preparation_id)?;
        validate_count_range(
            "ingredient",
            input
                .minimum_ingredient_count
                .unwrap_or(current.minimum_ingredient_count),
            input
                .maximum_ingredient_count
                .or(current.maximum_ingredient_count),
        )?;
        validate_count_range(
            "instrument",
            input
                .minimum_instrument_count
                .unwrap_or(current.minimum_instrument_count),
            input
                .maximum_instrument_count
                .or(current.maximum_instrument_count),
        )?;

        self.conn
            .execute_write(
                ctx,
                "valid preparation update",
                "UPDATE valid_preparations
                 SET name = COALESCE(?2, name),
                     description = COALESCE(?3, description),
                     icon_path = COALESCE(?4, icon_path),
                     past_tense = COALESCE(?5, past_tense),
                     slug = COALESCE(?6, slug),
                     yields_nothing = COALESCE(?7, yields_nothing),
                     restrict_to_ingredients = COALESCE(?8, restrict_to_ingredients),
                     minimum_ingredient_count = COALESCE(?9, minimum_ingredient_count),
                     maximum_ingredient_count = COALESCE(?10, maximum_ingredient_count),
                     minimum_instrument_count = COALESCE(?11, minimum_instrument_count),
                     maximum_instrument_count = COALESCE(?12, maximum_instrument_count),
                     temperature_required = COALESCE(?13, temperature_required),
                     time_estimate_required = COALESCE(?14, time_estimate_required),
                     last_updated_at = ?15
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    preparation_id,
                    input.name,
                    input.description,
                    input.icon_path,
                    input.past_tense,
                    input.slug,
                    input.yields_nothing.map(bool_to_int),
                    input.restrict_to_ingredients.map(bool_to_int),
                    input.minimum_ingredient_count,
                    input.maximum_ingredient_count,
                    input.minimum_instrument_count,
                    input.maximum_instrument_count,
                    input.temperature_required.map(bool_to_int),
                    input.time_estimate_required.map(bool_to_int),
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update valid preparation", preparation_id)?;
        self.fetch(ctx, preparation_id)
            .annotate("update valid preparation", preparation_id)
    }

    fn archive_valid_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
    ) -> StoreResult<()> {
        require_id(preparation_id, "valid preparation id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "valid preparation archive",
                "UPDATE valid_preparations
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![preparation_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive valid preparation", preparation_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("valid preparation"))
                .annotate("archive valid preparation", preparation_id);
        }
        Ok(())
    }
}
