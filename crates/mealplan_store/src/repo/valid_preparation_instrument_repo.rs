//! Instruments a preparation calls for.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    ListPage, QueryFilter, ValidPreparationInstrument, ValidPreparationInstrumentCreationInput,
    ValidPreparationInstrumentUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{get_opt_time, get_time, time_to_db};
use crate::repo::rows::{
    valid_instrument_columns, valid_instrument_from_row, valid_preparation_columns,
    valid_preparation_from_row,
};
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

const PREPARATION_INSTRUMENT_FROM: &str = "valid_preparation_instruments
    INNER JOIN valid_preparations
        ON valid_preparations.id = valid_preparation_instruments.valid_preparation_id
    INNER JOIN valid_instruments
        ON valid_instruments.id = valid_preparation_instruments.valid_instrument_id";

static PREPARATION_INSTRUMENT_SELECT: Lazy<String> = Lazy::new(|| {
    format!(
        "valid_preparation_instruments.id,
         valid_preparation_instruments.notes,
         valid_preparation_instruments.created_at,
         valid_preparation_instruments.last_updated_at,
         valid_preparation_instruments.archived_at,
         {},
         {}",
        valid_preparation_columns("valid_preparations", "preparation_"),
        valid_instrument_columns("valid_instruments", "instrument_")
    )
});

pub trait ValidPreparationInstrumentRepository {
    fn valid_preparation_instrument_exists(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<bool>;
    fn get_valid_preparation_instrument(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<ValidPreparationInstrument>;
    fn list_valid_preparation_instruments(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparationInstrument>>;
    fn list_valid_preparation_instruments_for_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparationInstrument>>;
    fn list_valid_preparation_instruments_for_instrument(
        &self,
        ctx: &QueryContext,
        instrument_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparationInstrument>>;
    fn create_valid_preparation_instrument(
        &self,
        ctx: &QueryContext,
        input: &ValidPreparationInstrumentCreationInput,
    ) -> StoreResult<ValidPreparationInstrument>;
    fn update_valid_preparation_instrument(
        &self,
        ctx: &QueryContext,
        link_id: &str,
        input: &ValidPreparationInstrumentUpdateInput,
    ) -> StoreResult<ValidPreparationInstrument>;
    fn archive_valid_preparation_instrument(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteValidPreparationInstrumentRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteValidPreparationInstrumentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[(
                "valid_preparation_instruments",
                &["notes", "valid_preparation_id", "valid_instrument_id"],
            )],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch(&self, ctx: &QueryContext, link_id: &str) -> StoreResult<ValidPreparationInstrument> {
        let sql = format!(
            "SELECT {}
             FROM {PREPARATION_INSTRUMENT_FROM}
             WHERE valid_preparation_instruments.id = ?1
               AND valid_preparation_instruments.archived_at IS NULL;",
            PREPARATION_INSTRUMENT_SELECT.as_str()
        );
        self.conn.read_one(
            ctx,
            "valid preparation instrument",
            &sql,
            [link_id],
            preparation_instrument_from_row,
        )
    }

    fn list_with(
        &self,
        ctx: &QueryContext,
        spec: ListSpec<'_>,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparationInstrument>> {
        list_page(
            self.conn,
            ctx,
            "valid preparation instrument",
            &spec,
            filter,
            preparation_instrument_from_row,
        )
    }
}

fn base_spec() -> ListSpec<'static> {
    ListSpec::new(
        "valid_preparation_instruments",
        PREPARATION_INSTRUMENT_SELECT.as_str(),
        PREPARATION_INSTRUMENT_FROM,
    )
}

impl ValidPreparationInstrumentRepository for SqliteValidPreparationInstrumentRepository<'_> {
    fn valid_preparation_instrument_exists(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<bool> {
        require_id(link_id, "valid preparation instrument id")?;
        self.conn
            .read_exists(
                ctx,
                "valid preparation instrument existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM valid_preparation_instruments
                    WHERE id = ?1 AND archived_at IS NULL
                );",
                [link_id],
            )
            .annotate("check valid preparation instrument existence", link_id)
    }

    fn get_valid_preparation_instrument(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<ValidPreparationInstrument> {
        require_id(link_id, "valid preparation instrument id")?;
        self.fetch(ctx, link_id)
            .annotate("get valid preparation instrument", link_id)
    }

    fn list_valid_preparation_instruments(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparationInstrument>> {
        self.list_with(ctx, base_spec(), filter)
            .annotate("list valid preparation instruments", "*")
    }

    fn list_valid_preparation_instruments_for_preparation(
        &self,
        ctx: &QueryContext,
        preparation_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparationInstrument>> {
        require_id(preparation_id, "valid preparation id")?;
        let spec = base_spec().scoped(
            "valid_preparation_instruments.valid_preparation_id = ?",
            vec![Value::Text(preparation_id.to_string())],
        );
        self.list_with(ctx, spec, filter)
            .annotate("list valid preparation instruments for preparation", preparation_id)
    }

    fn list_valid_preparation_instruments_for_instrument(
        &self,
        ctx: &QueryContext,
        instrument_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ValidPreparationInstrument>> {
        require_id(instrument_id, "valid instrument id")?;
        let spec = base_spec().scoped(
            "valid_preparation_instruments.valid_instrument_id = ?",
            vec![Value::Text(instrument_id.to_string())],
        );
        self.list_with(ctx, spec, filter)
            .annotate("list valid preparation instruments for instrument", instrument_id)
    }

    fn create_valid_preparation_instrument(
        &self,
        ctx: &QueryContext,
        input: &ValidPreparationInstrumentCreationInput,
    ) -> StoreResult<ValidPreparationInstrument> {
        require_id(&input.id, "valid preparation instrument id")?;
        require_id(&input.valid_preparation_id, "valid preparation id")?;
        require_id(&input.valid_instrument_id, "valid instrument id")?;
        self.conn
            .execute_write(
                ctx,
                "valid preparation instrument creation",
                "INSERT INTO valid_preparation_instruments (
                    id, notes, valid_preparation_id, valid_instrument_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    input.id,
                    input.notes,
                    input.valid_preparation_id,
                    input.valid_instrument_id,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("create valid preparation instrument", &input.id)?;
        info!(
            "event=valid_preparation_instrument_create module=repo status=ok id={} preparation_id={} instrument_id={}",
            input.id, input.valid_preparation_id, input.valid_instrument_id
        );
        self.fetch(ctx, &input.id)
            .annotate("create valid preparation instrument", &input.id)
    }

    fn update_valid_preparation_instrument(
        &self,
        ctx: &QueryContext,
        link_id: &str,
        input: &ValidPreparationInstrumentUpdateInput,
    ) -> StoreResult<ValidPreparationInstrument> {
        require_id(link_id, "valid preparation instrument id")?;
        let changed = self
            .conn
            .execute_write(
                ctx,
                "valid preparation instrument update",
                "UPDATE valid_preparation_instruments
                 SET notes = COALESCE(?2, notes),
                     valid_preparation_id = COALESCE(?3, valid_preparation_id),
                     valid_instrument_id = COALESCE(?4, valid_instrument_id),
                     last_updated_at = ?5
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    link_id,
                    input.notes,
                    input.valid_preparation_id,
                    input.valid_instrument_id,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update valid preparation instrument", link_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("valid preparation instrument"))
                .annotate("update valid preparation instrument", link_id);
        }
        self.fetch(ctx, link_id)
            .annotate("update valid preparation instrument", link_id)
    }

    fn archive_valid_preparation_instrument(
        &self,
        ctx: &QueryContext,
        link_id: &str,
    ) -> StoreResult<()> {
        require_id(link_id, "valid preparation instrument id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "valid preparation instrument archive",
                "UPDATE valid_preparation_instruments
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![link_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive valid preparation instrument", link_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("valid preparation instrument"))
                .annotate("archive valid preparation instrument", link_id);
        }
        Ok(())
    }
}

fn preparation_instrument_from_row(row: &Row<'_>) -> StoreResult<ValidPreparationInstrument> {
    Ok(ValidPreparationInstrument {
        id: row.get("id")?,
        notes: row.get("notes")?,
        preparation: valid_preparation_from_row(row, "preparation_")?,
        instrument: valid_instrument_from_row(row, "instrument_")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
