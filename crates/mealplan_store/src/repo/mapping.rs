//! Row/argument conversions shared by every repository.
//!
//! # Responsibility
//! - Convert between SQLite column values and domain field types.
//! - Reject persisted values outside a column's vocabulary as `InvalidData`.
//!
//! # Invariants
//! - Timestamps are stored as whole Unix seconds (UTC).
//! - Booleans are stored as `0`/`1`; anything else fails to decode.
//! - Enumerations are stored in their canonical spelling.

use crate::error::{StoreError, StoreResult};
use crate::model::ENUMERATION_DELIMITER;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use std::str::FromStr;

pub(crate) fn time_to_db(value: DateTime<Utc>) -> i64 {
    value.timestamp()
}

pub(crate) fn time_from_db(seconds: i64, column: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        StoreError::invalid_data(format!("timestamp `{seconds}` out of range in {column}"))
    })
}

pub(crate) fn get_time(row: &Row<'_>, column: &str) -> StoreResult<DateTime<Utc>> {
    let seconds: i64 = row.get(column)?;
    time_from_db(seconds, column)
}

pub(crate) fn get_opt_time(row: &Row<'_>, column: &str) -> StoreResult<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(column)? {
        Some(seconds) => Ok(Some(time_from_db(seconds, column)?)),
        None => Ok(None),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn get_bool(row: &Row<'_>, column: &str) -> StoreResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::invalid_data(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

pub(crate) fn get_u32(row: &Row<'_>, column: &str) -> StoreResult<u32> {
    let value: i64 = row.get(column)?;
    u32::try_from(value)
        .map_err(|_| StoreError::invalid_data(format!("value `{value}` out of range in {column}")))
}

pub(crate) fn get_opt_u32(row: &Row<'_>, column: &str) -> StoreResult<Option<u32>> {
    match row.get::<_, Option<i64>>(column)? {
        Some(value) => u32::try_from(value).map(Some).map_err(|_| {
            StoreError::invalid_data(format!("value `{value}` out of range in {column}"))
        }),
        None => Ok(None),
    }
}

/// Parses stored enum text; an unknown spelling is corrupt data, not bad input.
pub(crate) fn get_enum<T>(row: &Row<'_>, column: &str) -> StoreResult<T>
where
    T: FromStr<Err = StoreError>,
{
    let text: String = row.get(column)?;
    parse_stored_enum(&text, column)
}

pub(crate) fn get_opt_enum<T>(row: &Row<'_>, column: &str) -> StoreResult<Option<T>>
where
    T: FromStr<Err = StoreError>,
{
    match row.get::<_, Option<String>>(column)? {
        Some(text) => Ok(Some(parse_stored_enum(&text, column)?)),
        None => Ok(None),
    }
}

fn parse_stored_enum<T>(text: &str, column: &str) -> StoreResult<T>
where
    T: FromStr<Err = StoreError>,
{
    text.parse::<T>()
        .map_err(|_| StoreError::invalid_data(format!("invalid value `{text}` in {column}")))
}

/// Splits a stored enumeration, dropping empty and whitespace-only segments.
pub(crate) fn split_enumeration(raw: &str) -> Vec<String> {
    raw.split(ENUMERATION_DELIMITER)
        .filter(|segment| !segment.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn join_enumeration(options: &[String]) -> String {
    let mut joined = String::new();
    for (index, option) in options.iter().enumerate() {
        if index > 0 {
            joined.push(ENUMERATION_DELIMITER);
        }
        joined.push_str(option);
    }
    joined
}
