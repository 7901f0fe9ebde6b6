//! Instruments owned by a household.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    HouseholdInstrumentOwnership, HouseholdInstrumentOwnershipCreationInput,
    HouseholdInstrumentOwnershipUpdateInput, ListPage, QueryFilter,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{get_opt_time, get_time, get_u32, time_to_db};
use crate::repo::rows::{valid_instrument_columns, valid_instrument_from_row};
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

const OWNERSHIP_FROM: &str = "household_instrument_ownerships
    INNER JOIN valid_instruments
        ON valid_instruments.id = household_instrument_ownerships.valid_instrument_id";

static OWNERSHIP_SELECT: Lazy<String> = Lazy::new(|| {
    format!(
        "household_instrument_ownerships.id,
         household_instrument_ownerships.notes,
         household_instrument_ownerships.quantity,
         household_instrument_ownerships.belongs_to_household,
         household_instrument_ownerships.created_at,
         household_instrument_ownerships.last_updated_at,
         household_instrument_ownerships.archived_at,
         {}",
        valid_instrument_columns("valid_instruments", "instrument_")
    )
});

pub trait HouseholdInstrumentOwnershipRepository {
    fn household_instrument_ownership_exists(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
    ) -> StoreResult<bool>;
    fn get_household_instrument_ownership(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
    ) -> StoreResult<HouseholdInstrumentOwnership>;
    fn list_household_instrument_ownerships(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<HouseholdInstrumentOwnership>>;
    fn create_household_instrument_ownership(
        &self,
        ctx: &QueryContext,
        input: &HouseholdInstrumentOwnershipCreationInput,
    ) -> StoreResult<HouseholdInstrumentOwnership>;
    fn update_household_instrument_ownership(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
        input: &HouseholdInstrumentOwnershipUpdateInput,
    ) -> StoreResult<HouseholdInstrumentOwnership>;
    fn archive_household_instrument_ownership(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteHouseholdInstrumentOwnershipRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteHouseholdInstrumentOwnershipRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[(
                "household_instrument_ownerships",
                &["quantity", "valid_instrument_id", "belongs_to_household"],
            )],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
    ) -> StoreResult<HouseholdInstrumentOwnership> {
        let sql = format!(
            "SELECT {}
             FROM {OWNERSHIP_FROM}
             WHERE household_instrument_ownerships.id = ?1
               AND household_instrument_ownerships.belongs_to_household = ?2
               AND household_instrument_ownerships.archived_at IS NULL;",
            OWNERSHIP_SELECT.as_str()
        );
        self.conn.read_one(
            ctx,
            "household instrument ownership",
            &sql,
            params![ownership_id, household_id],
            ownership_from_row,
        )
    }
}

impl HouseholdInstrumentOwnershipRepository for SqliteHouseholdInstrumentOwnershipRepository<'_> {
    fn household_instrument_ownership_exists(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
    ) -> StoreResult<bool> {
        require_id(ownership_id, "instrument ownership id")?;
        require_id(household_id, "household id")?;
        self.conn
            .read_exists(
                ctx,
                "household instrument ownership existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM household_instrument_ownerships
                    WHERE id = ?1 AND belongs_to_household = ?2 AND archived_at IS NULL
                );",
                params![ownership_id, household_id],
            )
            .annotate("check household instrument ownership existence", ownership_id)
    }

    fn get_household_instrument_ownership(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
    ) -> StoreResult<HouseholdInstrumentOwnership> {
        require_id(ownership_id, "instrument ownership id")?;
        require_id(household_id, "household id")?;
        self.fetch(ctx, ownership_id, household_id)
            .annotate("get household instrument ownership", ownership_id)
    }

    fn list_household_instrument_ownerships(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<HouseholdInstrumentOwnership>> {
        require_id(household_id, "household id")?;
        let spec = ListSpec::new(
            "household_instrument_ownerships",
            OWNERSHIP_SELECT.as_str(),
            OWNERSHIP_FROM,
        )
        .scoped(
            "household_instrument_ownerships.belongs_to_household = ?",
            vec![Value::Text(household_id.to_string())],
        );
        list_page(
            self.conn,
            ctx,
            "household instrument ownership",
            &spec,
            filter,
            ownership_from_row,
        )
        .annotate("list household instrument ownerships", household_id)
    }

    fn create_household_instrument_ownership(
        &self,
        ctx: &QueryContext,
        input: &HouseholdInstrumentOwnershipCreationInput,
    ) -> StoreResult<HouseholdInstrumentOwnership> {
        input.validate()?;
        self.conn
            .execute_write(
                ctx,
                "household instrument ownership creation",
                "INSERT INTO household_instrument_ownerships (
                    id, notes, quantity, valid_instrument_id, belongs_to_household, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    input.id,
                    input.notes,
                    input.quantity,
                    input.valid_instrument_id,
                    input.belongs_to_household,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("create household instrument ownership", &input.id)?;
        info!(
            "event=household_instrument_ownership_create module=repo status=ok id={} household_id={}",
            input.id, input.belongs_to_household
        );
        self.fetch(ctx, &input.id, &input.belongs_to_household)
            .annotate("create household instrument ownership", &input.id)
    }

    fn update_household_instrument_ownership(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
        input: &HouseholdInstrumentOwnershipUpdateInput,
    ) -> StoreResult<HouseholdInstrumentOwnership> {
        require_id(ownership_id, "instrument ownership id")?;
        require_id(household_id, "household id")?;
        let changed = self
            .conn
            .execute_write(
                ctx,
                "household instrument ownership update",
                "UPDATE household_instrument_ownerships
                 SET notes = COALESCE(?3, notes),
                     quantity = COALESCE(?4, quantity),
                     valid_instrument_id = COALESCE(?5, valid_instrument_id),
                     last_updated_at = ?6
                 WHERE id = ?1 AND belongs_to_household = ?2 AND archived_at IS NULL;",
                params![
                    ownership_id,
                    household_id,
                    input.notes,
                    input.quantity,
                    input.valid_instrument_id,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update household instrument ownership", ownership_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("household instrument ownership"))
                .annotate("update household instrument ownership", ownership_id);
        }
        self.fetch(ctx, ownership_id, household_id)
            .annotate("update household instrument ownership", ownership_id)
    }

    fn archive_household_instrument_ownership(
        &self,
        ctx: &QueryContext,
        ownership_id: &str,
        household_id: &str,
    ) -> StoreResult<()> {
        require_id(ownership_id, "instrument ownership id")?;
        require_id(household_id, "household id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "household instrument ownership archive",
                "UPDATE household_instrument_ownerships
                 SET archived_at = ?3, last_updated_at = ?3
                 WHERE id = ?1 AND belongs_to_household = ?2 AND archived_at IS NULL;",
                params![ownership_id, household_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive household instrument ownership", ownership_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("household instrument ownership"))
                .annotate("archive household instrument ownership", ownership_id);
        }
        Ok(())
    }
}

fn ownership_from_row(row: &Row<'_>) -> StoreResult<HouseholdInstrumentOwnership> {
    Ok(HouseholdInstrumentOwnership {
        id: row.get("id")?,
        notes: row.get("notes")?,
        quantity: get_u32(row, "quantity")?,
        instrument: valid_instrument_from_row(row, "instrument_")?,
        belongs_to_household: row.get("belongs_to_household")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
