//! Conversion factors between measurement units, optionally restricted to
//! a single ingredient.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    ValidMeasurementUnitConversion, ValidMeasurementUnitConversionCreationInput,
    ValidMeasurementUnitConversionUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::mapping::{get_opt_time, get_time, time_to_db};
use crate::repo::rows::{
    valid_ingredient_columns, valid_ingredient_from_row, valid_measurement_unit_columns,
    valid_measurement_unit_from_row,
};
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::{params, Connection, Row};

const CONVERSION_FROM: &str = "valid_measurement_unit_conversions
    INNER JOIN valid_measurement_units AS from_units
        ON from_units.id = valid_measurement_unit_conversions.from_unit
    INNER JOIN valid_measurement_units AS to_units
        ON to_units.id = valid_measurement_unit_conversions.to_unit
    LEFT JOIN valid_ingredients
        ON valid_ingredients.id = valid_measurement_unit_conversions.only_for_ingredient";

static CONVERSION_SELECT: Lazy<String> = Lazy::new(|| {
    format!(
        "valid_measurement_unit_conversions.id,
         valid_measurement_unit_conversions.modifier,
         valid_measurement_unit_conversions.notes,
         valid_measurement_unit_conversions.created_at,
         valid_measurement_unit_conversions.last_updated_at,
         valid_measurement_unit_conversions.archived_at,
         {},
         {},
         {}",
        valid_measurement_unit_columns("from_units", "from_"),
        valid_measurement_unit_columns("to_units", "to_"),
        valid_ingredient_columns("valid_ingredients", "ingredient_")
    )
});

pub trait ValidMeasurementUnitConversionRepository {
    fn valid_measurement_unit_conversion_exists(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
    ) -> StoreResult<bool>;
    fn get_valid_measurement_unit_conversion(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
    ) -> StoreResult<ValidMeasurementUnitConversion>;
    /// Conversions whose source is `unit_id`.
    fn list_valid_measurement_unit_conversions_from_unit(
        &self,
        ctx: &QueryContext,
        unit_id: &str,
    ) -> StoreResult<Vec<ValidMeasurementUnitConversion>>;
    /// Conversions whose target is `unit_id`.
    fn list_valid_measurement_unit_conversions_to_unit(
        &self,
        ctx: &QueryContext,
        unit_id: &str,
    ) -> StoreResult<Vec<ValidMeasurementUnitConversion>>;
    fn create_valid_measurement_unit_conversion(
        &self,
        ctx: &QueryContext,
        input: &ValidMeasurementUnitConversionCreationInput,
    ) -> StoreResult<ValidMeasurementUnitConversion>;
    fn update_valid_measurement_unit_conversion(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
        input: &ValidMeasurementUnitConversionUpdateInput,
    ) -> StoreResult<ValidMeasurementUnitConversion>;
    fn archive_valid_measurement_unit_conversion(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteValidMeasurementUnitConversionRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteValidMeasurementUnitConversionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                (
                    "valid_measurement_unit_conversions",
                    &["from_unit", "to_unit", "only_for_ingredient", "modifier"],
                ),
                ("valid_measurement_units", &["volumetric", "imperial"]),
            ],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
    ) -> StoreResult<ValidMeasurementUnitConversion> {
        let sql = format!(
            "SELECT {}
             FROM {CONVERSION_FROM}
             WHERE valid_measurement_unit_conversions.id = ?1
               AND valid_measurement_unit_conversions.archived_at IS NULL;",
            CONVERSION_SELECT.as_str()
        );
        self.conn.read_one(
            ctx,
            "valid measurement unit conversion",
            &sql,
            [conversion_id],
            conversion_from_row,
        )
    }

    fn list_by_unit(
        &self,
        ctx: &QueryContext,
        unit_column: &'static str,
        unit_id: &str,
    ) -> StoreResult<Vec<ValidMeasurementUnitConversion>> {
        let sql = format!(
            "SELECT {}
             FROM {CONVERSION_FROM}
             WHERE valid_measurement_unit_conversions.{unit_column} = ?1
               AND valid_measurement_unit_conversions.archived_at IS NULL
             ORDER BY valid_measurement_unit_conversions.created_at ASC,
                      valid_measurement_unit_conversions.id ASC;",
            CONVERSION_SELECT.as_str()
        );
        self.conn.read_many(
            ctx,
            "valid measurement unit conversion",
            &sql,
            [unit_id],
            conversion_from_row,
        )
    }
}

impl ValidMeasurementUnitConversionRepository
    for SqliteValidMeasurementUnitConversionRepository<'_>
{
    fn valid_measurement_unit_conversion_exists(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
    ) -> StoreResult<bool> {
        require_id(conversion_id, "unit conversion id")?;
        self.conn
            .read_exists(
                ctx,
                "valid measurement unit conversion existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM valid_measurement_unit_conversions
                    WHERE id = ?1 AND archived_at IS NULL
                );",
                [conversion_id],
            )
            .annotate("check unit conversion existence", conversion_id)
    }

    fn get_valid_measurement_unit_conversion(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
    ) -> StoreResult<ValidMeasurementUnitConversion> {
        require_id(conversion_id, "unit conversion id")?;
        self.fetch(ctx, conversion_id)
            .annotate("get unit conversion", conversion_id)
    }

    fn list_valid_measurement_unit_conversions_from_unit(
        &self,
        ctx: &QueryContext,
        unit_id: &str,
    ) -> StoreResult<Vec<ValidMeasurementUnitConversion>> {
        require_id(unit_id, "measurement unit id")?;
        self.list_by_unit(ctx, "from_unit", unit_id)
            .annotate("list unit conversions from unit", unit_id)
    }

    fn list_valid_measurement_unit_conversions_to_unit(
        &self,
        ctx: &QueryContext,
        unit_id: &str,
    ) -> StoreResult<Vec<ValidMeasurementUnitConversion>> {
        require_id(unit_id, "measurement unit id")?;
        self.list_by_unit(ctx, "to_unit", unit_id)
            .annotate("list unit conversions to unit", unit_id)
    }

    fn create_valid_measurement_unit_conversion(
        &self,
        ctx: &QueryContext,
        input: &ValidMeasurementUnitConversionCreationInput,
    ) -> StoreResult<ValidMeasurementUnitConversion> {
        input.validate()?;
        self.conn
            .execute_write(
                ctx,
                "valid measurement unit conversion creation",
                "INSERT INTO valid_measurement_unit_conversions (
                    id, from_unit, to_unit, only_for_ingredient, modifier, notes, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    input.id,
                    input.from_unit,
                    input.to_unit,
                    input.only_for_ingredient,
                    input.modifier,
                    input.notes,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("create unit conversion", &input.id)?;
        info!(
            "event=unit_conversion_create module=repo status=ok id={} from={} to={}",
            input.id, input.from_unit, input.to_unit
        );
        self.fetch(ctx, &input.id)
            .annotate("create unit conversion", &input.id)
    }

    fn update_valid_measurement_unit_conversion(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
        input: &ValidMeasurementUnitConversionUpdateInput,
    ) -> StoreResult<ValidMeasurementUnitConversion> {
        require_id(conversion_id, "unit conversion id")?;
        if let Some(modifier) = input.modifier {
            if !modifier.is_finite() || modifier == 0.0 {
                return Err(StoreError::invalid_input("conversion modifier must be non-zero"));
            }
        }
        let current = self
            .fetch(ctx, conversion_id)
            .annotate("update unit conversion", conversion_id)?;
        let from_unit = input.from_unit.as_deref().unwrap_or(&current.from.id);
        let to_unit = input.to_unit.as_deref().unwrap_or(&current.to.id);
        if from_unit == to_unit {
            return Err(StoreError::invalid_input(
                "conversion must be between two different units",
            ));
        }
        let only_for_ingredient = match &input.only_for_ingredient {
            Some(replacement) => replacement.clone(),
            None => current.only_for_ingredient.map(|ingredient| ingredient.id),
        };

        let changed = self
            .conn
            .execute_write(
                ctx,
                "valid measurement unit conversion update",
                "UPDATE valid_measurement_unit_conversions
                 SET from_unit = ?2,
                     to_unit = ?3,
                     only_for_ingredient = ?4,
                     modifier = COALESCE(?5, modifier),
                     notes = COALESCE(?6, notes),
                     last_updated_at = ?7
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    conversion_id,
                    from_unit,
                    to_unit,
                    only_for_ingredient,
                    input.modifier,
                    input.notes,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update unit conversion", conversion_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("valid measurement unit conversion"))
                .annotate("update unit conversion", conversion_id);
        }
        self.fetch(ctx, conversion_id)
            .annotate("update unit conversion", conversion_id)
    }

    fn archive_valid_measurement_unit_conversion(
        &self,
        ctx: &QueryContext,
        conversion_id: &str,
    ) -> StoreResult<()> {
        require_id(conversion_id, "unit conversion id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "valid measurement unit conversion archive",
                "UPDATE valid_measurement_unit_conversions
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![conversion_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive unit conversion", conversion_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("valid measurement unit conversion"))
                .annotate("archive unit conversion", conversion_id);
        }
        Ok(())
    }
}

fn conversion_from_row(row: &Row<'_>) -> StoreResult<ValidMeasurementUnitConversion> {
    let restricted: Option<String> = row.get("ingredient_id")?;
    let only_for_ingredient = match restricted {
        Some(_) => Some(valid_ingredient_from_row(row, "ingredient_")?),
        None => None,
    };
    Ok(ValidMeasurementUnitConversion {
        id: row.get("id")?,
        from: valid_measurement_unit_from_row(row, "from_")?,
        to: valid_measurement_unit_from_row(row, "to_")?,
        only_for_ingredient,
        modifier: row.get("modifier")?,
        notes: row.get("notes")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
