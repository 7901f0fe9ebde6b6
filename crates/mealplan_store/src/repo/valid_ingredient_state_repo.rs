use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    validate_slug, ListPage, QueryFilter, ValidIngredientState, ValidIngredientStateCreationInput,
    ValidIngredientStateUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::time_to_db;
use crate::repo::rows::{valid_ingredient_state_columns, valid_ingredient_state_from_row};
use crate::repo::valid_ingredient_group_repo::SEARCH_RESULT_LIMIT;
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::{params, Connection};

static STATE_COLUMNS: Lazy<String> =
    Lazy::new(|| valid_ingredient_state_columns("valid_ingredient_states", ""));

pub trait ValidIngredientStateRepository {
    fn valid_ingredient_state_exists(&self, ctx: &QueryContext, state_id: &str)
        -> StoreResult<bool>;
    fn get_valid_ingredient_state(
        &self,
        ctx: &QueryContext,
        state_id: &str,
    ) -> StoreResult<ValidIngredientState>;
    fn list_valid_ingredient_states(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientState>>;
    /// Name substring search, capped at [`SEARCH_RESULT_LIMIT`].
    fn search_valid_ingredient_states(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> StoreResult<Vec<ValidIngredientState>>;
    fn create_valid_ingredient_state(
        &self,
        ctx: &QueryContext,
        input: &ValidIngredientStateCreationInput,
    ) -> StoreResult<ValidIngredientState>;
    fn update_valid_ingredient_state(
        &self,
        ctx: &QueryContext,
        state_id: &str,
        input: &ValidIngredientStateUpdateInput,
    ) -> StoreResult<ValidIngredientState>;
    fn archive_valid_ingredient_state(&self, ctx: &QueryContext, state_id: &str)
        -> StoreResult<()>;
}

pub struct SqliteValidIngredientStateRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteValidIngredientStateRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[("valid_ingredient_states", &["slug", "past_tense", "attribute_type"])],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch(&self, ctx: &QueryContext, state_id: &str) -> StoreResult<ValidIngredientState> {
        let sql = format!(
            "SELECT {}
             FROM valid_ingredient_states
             WHERE valid_ingredient_states.id = ?1
               AND valid_ingredient_states.archived_at IS NULL;",
            STATE_COLUMNS.as_str()
        );
        self.conn.read_one(ctx, "valid ingredient state", &sql, [state_id], |row| {
            valid_ingredient_state_from_row(row, "")
        })
    }
}

impl ValidIngredientStateRepository for SqliteValidIngredientStateRepository<'_> {
    fn valid_ingredient_state_exists(
        &self,
        ctx: &QueryContext,
        state_id: &str,
    ) -> StoreResult<bool> {
        require_id(state_id, "valid ingredient state id")?;
        self.conn
            .read_exists(
                ctx,
                "valid ingredient state existence",
                "SELECT EXISTS (
                    SELECT 1 FROM valid_ingredient_states WHERE id = ?1 AND archived_at IS NULL
                );",
                [state_id],
            )
            .annotate("check valid ingredient state existence", state_id)
    }

    fn get_valid_ingredient_state(
        &self,
        ctx: &QueryContext,
        state_id: &str,
    ) -> StoreResult<ValidIngredientState> {
        require_id(state_id, "valid ingredient state id")?;
        self.fetch(ctx, state_id)
            .annotate("get valid ingredient state", state_id)
    }

    fn list_valid_ingredient_states(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidIngredientState>> {
        let spec = ListSpec::new(
            "valid_ingredient_states",
            STATE_COLUMNS.as_str(),
            "valid_ingredient_states",
        );
        list_page(self.conn, ctx, "valid ingredient state", &spec, filter, |row| {
            valid_ingredient_state_from_row(row, "")
        })
        .annotate("list valid ingredient states", "*")
    }

    fn search_valid_ingredient_states(
        &self,
        ctx: &QueryContext,
        query: &str,
    ) -> StoreResult<Vec<ValidIngredientState>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StoreError::invalid_input("search query must not be empty"));
        }
        let sql = format!(
            "SELECT {}
             FROM valid_ingredient_states
             WHERE valid_ingredient_states.name LIKE '%' || ?1 || '%'
               AND valid_ingredient_states.archived_at IS NULL
             ORDER BY valid_ingredient_states.name ASC, valid_ingredient_states.id ASC
             LIMIT ?2;",
            STATE_COLUMNS.as_str()
        );
        self.conn
            .read_many(
                ctx,
                "valid ingredient state",
                &sql,
                params![query, SEARCH_RESULT_LIMIT],
                |row| valid_ingredient_state_from_row(row, ""),
            )
            .annotate("search valid ingredient states", query)
    }

    fn create_valid_ingredient_state(
        &self,
        ctx: &QueryContext,
        input: &ValidIngredientStateCreationInput,
    ) -> StoreResult<ValidIngredientState> {
        input.validate()?;
        let now = self.runtime.now();
        self.conn
            .execute_write(
                ctx,
                "valid ingredient state creation",
                "INSERT INTO valid_ingredient_states (
                    id, name, past_tense, slug, description, icon_path, attribute_type, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    input.id,
                    input.name,
                    input.past_tense,
                    input.slug,
                    input.description,
                    input.icon_path,
                    input.attribute_type.as_str(),
                    time_to_db(now),
                ],
            )
            .annotate("create valid ingredient state", &input.id)?;

        info!(
            "event=valid_ingredient_state_create module=repo status=ok id={}",
            input.id
        );
        Ok(ValidIngredientState {
            id: input.id.clone(),
            name: input.name.clone(),
            past_tense: input.past_tense.clone(),
            slug: input.slug.clone(),
            description: input.description.clone(),
            icon_path: input.icon_path.clone(),
            attribute_type: input.attribute_type,
            created_at: now,
            last_updated_at: None,
            archived_at: None,
        })
    }

    fn update_valid_ingredient_state(
        &self,
        ctx: &QueryContext,
        state_id: &str,
        input: &ValidIngredientStateUpdateInput,
    ) -> StoreResult<ValidIngredientState> {
        require_id(state_id, "valid ingredient state id")?;
        if let Some(slug) = &input.slug {
            validate_slug(slug)?;
        }
        let changed = self
            .conn
            .execute_write(
                ctx,
                "valid ingredient state update",
                "UPDATE valid_ingredient_states
                 SET name = COALESCE(?2, name),
                     past_tense = COALESCE(?3, past_tense),
                     slug = COALESCE(?4, slug),
                     description = COALESCE(?5, description),
                     icon_path = COALESCE(?6, icon_path),
                     attribute_type = COALESCE(?7, attribute_type),
                     last_updated_at = ?8
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    state_id,
                    input.name,
                    input.past_tense,
                    input.slug,
                    input.description,
                    input.icon_path,
                    input.attribute_type.map(|kind| kind.as_str()),
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update valid ingredient state", state_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("valid ingredient state"))
                .annotate("update valid ingredient state", state_id);
        }
        self.fetch(ctx, state_id)
            .annotate("update valid ingredient state", state_id)
    }

    fn archive_valid_ingredient_state(
        &self,
        ctx: &QueryContext,
        state_id: &str,
    ) -> StoreResult<()> {
        require_id(state_id, "valid ingredient state id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "valid ingredient state archive",
                "UPDATE valid_ingredient_states
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![state_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive valid ingredient state", state_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("valid ingredient state"))
                .annotate("archive valid ingredient state", state_id);
        }
        Ok(())
    }
}
