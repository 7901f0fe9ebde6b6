//! Column lists and decoders for records that appear nested in joins.
//!
//! Each `*_columns(alias, prefix)` renders `alias.col AS prefixcol` pairs and
//! the matching `*_from_row(row, prefix)` reads them back, so one decoder
//! serves every join shape.

use crate::error::StoreResult;
use crate::model::{
    ValidIngredient, ValidIngredientState, ValidInstrument, ValidMeasurementUnit,
    ValidPreparation,
};
use crate::repo::mapping::{get_bool, get_enum, get_opt_time, get_opt_u32, get_time, get_u32};
use rusqlite::Row;

const TIMESTAMP_COLUMNS: [&str; 3] = ["created_at", "last_updated_at", "archived_at"];

const VALID_INGREDIENT_COLUMNS: &[&str] = &["id", "name", "plural_name", "description", "slug"];
const VALID_INSTRUMENT_COLUMNS: &[&str] = &["id", "name", "plural_name", "description", "slug"];
const VALID_MEASUREMENT_UNIT_COLUMNS: &[&str] = &[
    "id",
    "name",
    "plural_name",
    "description",
    "slug",
    "volumetric",
    "universal",
    "metric",
    "imperial",
];
const VALID_PREPARATION_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "icon_path",
    "past_tense",
    "slug",
    "yields_nothing",
    "restrict_to_ingredients",
    "minimum_ingredient_count",
    "maximum_ingredient_count",
    "minimum_instrument_count",
    "maximum_instrument_count",
    "temperature_required",
    "time_estimate_required",
];
const VALID_INGREDIENT_STATE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "past_tense",
    "slug",
    "description",
    "icon_path",
    "attribute_type",
];

fn render(alias: &str, prefix: &str, columns: &[&str]) -> String {
    columns
        .iter()
        .chain(TIMESTAMP_COLUMNS.iter())
        .map(|column| format!("{alias}.{column} AS {prefix}{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn col(prefix: &str, column: &str) -> String {
    format!("{prefix}{column}")
}

pub(crate) fn valid_ingredient_columns(alias: &str, prefix: &str) -> String {
    render(alias, prefix, VALID_INGREDIENT_COLUMNS)
}

pub(crate) fn valid_ingredient_from_row(row: &Row<'_>, prefix: &str) -> StoreResult<ValidIngredient> {
    Ok(ValidIngredient {
        id: row.get(col(prefix, "id").as_str())?,
        name: row.get(col(prefix, "name").as_str())?,
        plural_name: row.get(col(prefix, "plural_name").as_str())?,
        description: row.get(col(prefix, "description").as_str())?,
        slug: row.get(col(prefix, "slug").as_str())?,
        created_at: get_time(row, &col(prefix, "created_at"))?,
        last_updated_at: get_opt_time(row, &col(prefix, "last_updated_at"))?,
        archived_at: get_opt_time(row, &col(prefix, "archived_at"))?,
    })
}

pub(crate) fn valid_instrument_columns(alias: &str, prefix: &str) -> String {
    render(alias, prefix, VALID_INSTRUMENT_COLUMNS)
}

pub(crate) fn valid_instrument_from_row(row: &Row<'_>, prefix: &str) -> StoreResult<ValidInstrument> {
    Ok(ValidInstrument {
        id: row.get(col(prefix, "id").as_str())?,
        name: row.get(col(prefix, "name").as_str())?,
        plural_name: row.get(col(prefix, "plural_name").as_str())?,
        description: row.get(col(prefix, "description").as_str())?,
        slug: row.get(col(prefix, "slug").as_str())?,
        created_at: get_time(row, &col(prefix, "created_at"))?,
        last_updated_at: get_opt_time(row, &col(prefix, "last_updated_at"))?,
        archived_at: get_opt_time(row, &col(prefix, "archived_at"))?,
    })
}

pub(crate) fn valid_measurement_unit_columns(alias: &str, prefix: &str) -> String {
    render(alias, prefix, VALID_MEASUREMENT_UNIT_COLUMNS)
}

pub(crate) fn valid_measurement_unit_from_row(
    row: &Row<'_>,
    prefix: &str,
) -> StoreResult<ValidMeasurementUnit> {
    Ok(ValidMeasurementUnit {
        id: row.get(col(prefix, "id").as_str())?,
        name: row.get(col(prefix, "name").as_str())?,
        plural_name: row.get(col(prefix, "plural_name").as_str())?,
        description: row.get(col(prefix, "description").as_str())?,
        slug: row.get(col(prefix, "slug").as_str())?,
        volumetric: get_bool(row, &col(prefix, "volumetric"))?,
        universal: get_bool(row, &col(prefix, "universal"))?,
        metric: get_bool(row, &col(prefix, "metric"))?,
        imperial: get_bool(row, &col(prefix, "imperial"))?,
        created_at: get_time(row, &col(prefix, "created_at"))?,
        last_updated_at: get_opt_time(row, &col(prefix, "last_updated_at"))?,
        archived_at: get_opt_time(row, &col(prefix, "archived_at"))?,
    })
}

pub(crate) fn valid_preparation_columns(alias: &str, prefix: &str) -> String {
    render(alias, prefix, VALID_PREPARATION_COLUMNS)
}

pub(crate) fn valid_preparation_from_row(
    row: &Row<'_>,
    prefix: &str,
) -> StoreResult<ValidPreparation> {
    Ok(ValidPreparation {
        id: row.get(col(prefix, "id").as_str())?,
        name: row.get(col(prefix, "name").as_str())?,
        description: row.get(col(prefix, "description").as_str())?,
        icon_path: row.get(col(prefix, "icon_path").as_str())?,
        past_tense: row.get(col(prefix, "past_tense").as_str())?,
        slug: row.get(col(prefix, "slug").as_str())?,
        yields_nothing: get_bool(row, &col(prefix, "yields_nothing"))?,
        restrict_to_ingredients: get_bool(row, &col(prefix, "restrict_to_ingredients"))?,
        minimum_ingredient_count: get_u32(row, &col(prefix, "minimum_ingredient_count"))?,
        maximum_ingredient_count: get_opt_u32(row, &col(prefix, "maximum_ingredient_count"))?,
        minimum_instrument_count: get_u32(row, &col(prefix, "minimum_instrument_count"))?,
        maximum_instrument_count: get_opt_u32(row, &col(prefix, "maximum_instrument_count"))?,
        temperature_required: get_bool(row, &col(prefix, "temperature_required"))?,
        time_estimate_required: get_bool(row, &col(prefix, "time_estimate_required"))?,
        created_at: get_time(row, &col(prefix, "created_at"))?,
        last_updated_at: get_opt_time(row, &col(prefix, "last_updated_at"))?,
        archived_at: get_opt_time(row, &col(prefix, "archived_at"))?,
    })
}

pub(crate) fn valid_ingredient_state_columns(alias: &str, prefix: &str) -> String {
    render(alias, prefix, VALID_INGREDIENT_STATE_COLUMNS)
}

pub(crate) fn valid_ingredient_state_from_row(
    row: &Row<'_>,
    prefix: &str,
) -> StoreResult<ValidIngredientState> {
    Ok(ValidIngredientState {
        id: row.get(col(prefix, "id").as_str())?,
        name: row.get(col(prefix, "name").as_str())?,
        past_tense: row.get(col(prefix, "past_tense").as_str())?,
        slug: row.get(col(prefix, "slug").as_str())?,
        description: row.get(col(prefix, "description").as_str())?,
        icon_path: row.get(col(prefix, "icon_path").as_str())?,
        attribute_type: get_enum(row, &col(prefix, "attribute_type"))?,
        created_at: get_time(row, &col(prefix, "created_at"))?,
        last_updated_at: get_opt_time(row, &col(prefix, "last_updated_at"))?,
        archived_at: get_opt_time(row, &col(prefix, "archived_at"))?,
    })
}
