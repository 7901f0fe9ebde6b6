//! Paged list queries that carry filtered and total counts.
//!
//! # Responsibility
//! - Build one statement per page that returns rows plus both counts.
//! - Apply the archival rule, the caller's scope and the time window.
//!
//! # Invariants
//! - Every row of a page reports the same `(filtered, total)` pair; a
//!   disagreement is `InvalidData`.
//! - A page past the end still reports real counts (count-only fallback).
//! - Order is `created_at` then `id`, both in the filter's direction.
//! - `scope` may only reference columns of `table`, because it is also
//!   evaluated inside the count sub-selects.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{StoreError, StoreResult};
use crate::model::{ListPage, QueryFilter};
use crate::repo::mapping::time_to_db;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};

/// Static shape of one list query.
pub(crate) struct ListSpec<'a> {
    /// Table owning `id`, `created_at`, `last_updated_at` and `archived_at`.
    pub table: &'static str,
    /// Select list for the page rows.
    pub select: &'a str,
    /// `FROM` clause including any joins needed by `select`.
    pub from: &'a str,
    /// Extra predicate over `table` columns with `?` placeholders, or empty.
    pub scope: &'a str,
    pub scope_params: Vec<Value>,
}

impl<'a> ListSpec<'a> {
    pub fn new(table: &'static str, select: &'a str, from: &'a str) -> Self {
        Self {
            table,
            select,
            from,
            scope: "",
            scope_params: Vec::new(),
        }
    }

    pub fn scoped(mut self, scope: &'a str, params: Vec<Value>) -> Self {
        self.scope = scope;
        self.scope_params = params;
        self
    }
}

struct Predicate {
    sql: String,
    params: Vec<Value>,
}

fn base_predicate(spec: &ListSpec<'_>, filter: &QueryFilter) -> Predicate {
    let mut clauses = Vec::new();
    if !filter.include_archived {
        clauses.push(format!("{}.archived_at IS NULL", spec.table));
    }
    if !spec.scope.is_empty() {
        clauses.push(format!("({})", spec.scope));
    }
    if clauses.is_empty() {
        clauses.push("1 = 1".to_string());
    }
    Predicate {
        sql: clauses.join(" AND "),
        params: spec.scope_params.clone(),
    }
}

fn windowed_predicate(spec: &ListSpec<'_>, filter: &QueryFilter) -> Predicate {
    let mut predicate = base_predicate(spec, filter);
    let table = spec.table;
    let bounds = [
        (filter.created_before, format!("{table}.created_at < ?")),
        (filter.created_after, format!("{table}.created_at > ?")),
        (filter.updated_before, format!("{table}.last_updated_at < ?")),
        (filter.updated_after, format!("{table}.last_updated_at > ?")),
    ];
    for (bound, clause) in bounds {
        if let Some(at) = bound {
            predicate.sql.push_str(" AND ");
            predicate.sql.push_str(&clause);
            predicate.params.push(Value::Integer(time_to_db(at)));
        }
    }
    predicate
}

/// Runs a paged list query and returns the page with its counts.
pub(crate) fn list_page<E, T, F>(
    exec: &E,
    ctx: &QueryContext,
    description: &'static str,
    spec: &ListSpec<'_>,
    filter: &QueryFilter,
    mut map: F,
) -> StoreResult<ListPage<T>>
where
    E: QueryExecutor,
    F: FnMut(&Row<'_>) -> StoreResult<T>,
{
    let total = base_predicate(spec, filter);
    let filtered = windowed_predicate(spec, filter);
    let table = spec.table;
    let direction = filter.sort_direction.as_sql();

    let sql = format!(
        "SELECT {select},
            (SELECT COUNT(*) FROM {table} WHERE {filtered_sql}) AS filtered_count,
            (SELECT COUNT(*) FROM {table} WHERE {total_sql}) AS total_count
         FROM {from}
         WHERE {filtered_sql}
         ORDER BY {table}.created_at {direction}, {table}.id {direction}
         LIMIT ? OFFSET ?;",
        select = spec.select,
        from = spec.from,
        filtered_sql = filtered.sql,
        total_sql = total.sql,
    );

    let mut params = Vec::new();
    params.extend(filtered.params.iter().cloned());
    params.extend(total.params.iter().cloned());
    params.extend(filtered.params.iter().cloned());
    params.push(Value::Integer(i64::from(filter.limit())));
    params.push(Value::Integer(offset_to_db(filter.offset())?));

    let rows = exec.read_many(ctx, description, &sql, params_from_iter(params), |row| {
        let filtered_count: i64 = row.get("filtered_count")?;
        let total_count: i64 = row.get("total_count")?;
        Ok((map(row)?, filtered_count, total_count))
    })?;

    let mut counts: Option<(i64, i64)> = None;
    let mut items = Vec::with_capacity(rows.len());
    for (item, filtered_count, total_count) in rows {
        match counts {
            None => counts = Some((filtered_count, total_count)),
            Some(seen) if seen != (filtered_count, total_count) => {
                return Err(StoreError::invalid_data(format!(
                    "{description} list counts disagree across rows"
                )));
            }
            Some(_) => {}
        }
        items.push(item);
    }

    let (filtered_count, total_count) = match counts {
        Some(pair) => pair,
        None => count_only(exec, ctx, description, table, &filtered, &total)?,
    };

    Ok(ListPage {
        items,
        page: filter.page(),
        limit: filter.limit(),
        filtered_count: count_to_u64(filtered_count, description)?,
        total_count: count_to_u64(total_count, description)?,
    })
}

fn count_only<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    description: &'static str,
    table: &str,
    filtered: &Predicate,
    total: &Predicate,
) -> StoreResult<(i64, i64)> {
    let sql = format!(
        "SELECT
            (SELECT COUNT(*) FROM {table} WHERE {}),
            (SELECT COUNT(*) FROM {table} WHERE {});",
        filtered.sql, total.sql
    );
    let params = filtered
        .params
        .iter()
        .chain(total.params.iter())
        .cloned()
        .collect::<Vec<_>>();
    exec.read_one(ctx, description, &sql, params_from_iter(params), |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
}

fn offset_to_db(offset: u64) -> StoreResult<i64> {
    i64::try_from(offset).map_err(|_| StoreError::invalid_input("page offset is too large"))
}

fn count_to_u64(count: i64, description: &str) -> StoreResult<u64> {
    u64::try_from(count)
        .map_err(|_| StoreError::invalid_data(format!("negative {description} count")))
}
