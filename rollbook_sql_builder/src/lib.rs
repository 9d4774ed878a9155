#![forbid(unsafe_code)]
#![allow(unexpected_cfgs)]
//! SQL builder helpers that leverage metadata from `#[derive(Entity)]`.
//!
//! DDL is rendered from [`Schema`], DML from [`Query`] / [`Assignment`] values.
//! Statements use `?` placeholders; functions that bind values return them in
//! placeholder order next to the SQL text.

use rollbook_core::query::validate_columns;
use rollbook_core::{
    Assignment, ColumnDef, Fetchable, Filter, Insertable, ParamValue, Query, RepoError,
    RepoResult, Schema,
};

const PLACEHOLDER: &str = "?";

/// Build SELECT <cols> FROM <table>
pub fn select_all<E>() -> String
where
    E: Fetchable,
{
    let cols = E::SELECT_COLUMNS.join(", ");
    let table = E::TABLE;
    format!("SELECT {cols} FROM {table}", cols = cols, table = table)
}

/// Build a simple SELECT ... WHERE id = ? statement using metadata from `E`.
pub fn select_by_id<E>(id_column: &str) -> String
where
    E: Fetchable,
{
    format!(
        "{select} WHERE {id} = {ph}",
        select = select_all::<E>(),
        id = id_column,
        ph = PLACEHOLDER
    )
}

/// Build INSERT INTO <table> (<cols>) VALUES (<placeholders>)
pub fn insert<E>() -> String
where
    E: Fetchable + Insertable,
{
    let cols = E::INSERT_COLUMNS;
    let phs = vec![PLACEHOLDER; cols.len()].join(", ");
    format!(
        "INSERT INTO {table} ({cols}) VALUES ({vals})",
        table = E::TABLE,
        cols = cols.join(", "),
        vals = phs
    )
}

fn column_sql(col: &ColumnDef) -> String {
    let mut sql = format!("{} {}", col.name, col.sql_type);
    if !col.nullable && !col.primary_key {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = col.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    sql
}

/// Build CREATE TABLE IF NOT EXISTS with every constraint declared on `E`.
///
/// Constraints are emitted as named table constraints so violations reported by the
/// engine carry the declared names: primary key first, then per-column UNIQUE and
/// length checks in column order, then the table-level CHECKs.
pub fn create_table<E>() -> String
where
    E: Schema,
{
    let mut parts: Vec<String> = E::COLUMNS.iter().map(column_sql).collect();

    let pk_cols: Vec<&str> = E::COLUMNS
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name)
        .collect();
    if !pk_cols.is_empty() {
        let pk = format!("PRIMARY KEY ({})", pk_cols.join(", "));
        parts.push(match E::PRIMARY_KEY_NAME {
            Some(name) => format!("CONSTRAINT {name} {pk}"),
            None => pk,
        });
    }

    for col in E::COLUMNS {
        if let Some(name) = col.unique {
            parts.push(format!("CONSTRAINT {name} UNIQUE ({})", col.name));
        }
        if let Some(max) = col.max_length {
            parts.push(format!(
                "CONSTRAINT {col}_max_length CHECK (length({col}) <= {max})",
                col = col.name,
                max = max
            ));
        }
    }

    for check in E::CHECKS {
        parts.push(format!(
            "CONSTRAINT {} CHECK ({})",
            check.name, check.expr
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {table} ({body})",
        table = E::TABLE,
        body = parts.join(", ")
    )
}

/// Build one CREATE INDEX IF NOT EXISTS statement per declared index.
pub fn create_indexes<E>() -> Vec<String>
where
    E: Schema,
{
    E::INDEXES
        .iter()
        .map(|idx| {
            format!(
                "CREATE {unique}INDEX IF NOT EXISTS {name} ON {table} ({cols})",
                unique = if idx.unique { "UNIQUE " } else { "" },
                name = idx.name,
                table = E::TABLE,
                cols = idx.columns.join(", ")
            )
        })
        .collect()
}

/// Build WHERE clause for a conjunction (AND) of filters.
/// Returns ("WHERE <a> = ? AND <b> LIKE ? ...", params_in_order); both empty when there
/// are no filters.
pub fn build_where_and(filters: &[Filter]) -> (String, Vec<ParamValue>) {
    if filters.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut clauses: Vec<String> = Vec::with_capacity(filters.len());
    let mut out_params: Vec<ParamValue> = Vec::with_capacity(filters.len());
    for filter in filters {
        match filter {
            Filter::Eq(field, val) => {
                clauses.push(format!("{} = {}", field, PLACEHOLDER));
                out_params.push(val.clone());
            }
            Filter::Like(field, pattern) => {
                clauses.push(format!("{} LIKE {}", field, PLACEHOLDER));
                out_params.push(ParamValue::String(pattern.clone()));
            }
        }
    }
    (format!("WHERE {}", clauses.join(" AND ")), out_params)
}

fn push_where(sql: &mut String, query: &Query) -> Vec<ParamValue> {
    let (where_sql, params) = build_where_and(query.filters());
    if !where_sql.is_empty() {
        sql.push(' ');
        sql.push_str(&where_sql);
    }
    params
}

fn push_order_and_limit(sql: &mut String, query: &Query) {
    if !query.ordering().is_empty() {
        let terms: Vec<String> = query
            .ordering()
            .iter()
            .map(|(col, order)| format!("{} {}", col, order.as_sql()))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }
    if let Some(limit) = query.max_rows() {
        sql.push_str(" LIMIT ");
        sql.push_str(&limit.to_string());
    }
}

/// Build SELECT <all cols> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n]
pub fn select_query<E>(query: &Query) -> RepoResult<(String, Vec<ParamValue>)>
where
    E: Fetchable,
{
    query.validate::<E>()?;
    let mut sql = select_all::<E>();
    let params = push_where(&mut sql, query);
    push_order_and_limit(&mut sql, query);
    Ok((sql, params))
}

/// Build SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n]
pub fn select_columns<E>(columns: &[&str], query: &Query) -> RepoResult<(String, Vec<ParamValue>)>
where
    E: Fetchable,
{
    if columns.is_empty() {
        return Err(RepoError::invalid_query("projection needs at least one column"));
    }
    validate_columns::<E, _>(columns.iter().copied())?;
    query.validate::<E>()?;
    let mut sql = format!(
        "SELECT {cols} FROM {table}",
        cols = columns.join(", "),
        table = E::TABLE
    );
    let params = push_where(&mut sql, query);
    push_order_and_limit(&mut sql, query);
    Ok((sql, params))
}

/// Build SELECT COUNT(*) FROM <table> [WHERE ...]. Ordering and limit do not apply.
pub fn count_query<E>(query: &Query) -> RepoResult<(String, Vec<ParamValue>)>
where
    E: Fetchable,
{
    query.validate::<E>()?;
    let mut sql = format!("SELECT COUNT(*) FROM {table}", table = E::TABLE);
    let params = push_where(&mut sql, query);
    Ok((sql, params))
}

/// Build UPDATE <table> SET <assignments> [WHERE ...]
///
/// Parameters come back in statement order: SET values first, then WHERE values.
/// Ordering and limits are rejected because plain SQLite builds do not accept them on
/// UPDATE.
pub fn update_query<E>(
    assignments: &[Assignment],
    query: &Query,
) -> RepoResult<(String, Vec<ParamValue>)>
where
    E: Fetchable,
{
    if assignments.is_empty() {
        return Err(RepoError::invalid_query("update needs at least one assignment"));
    }
    if !query.ordering().is_empty() || query.max_rows().is_some() {
        return Err(RepoError::invalid_query(
            "ORDER BY and LIMIT are not supported on bulk updates",
        ));
    }
    validate_columns::<E, _>(assignments.iter().map(Assignment::column))?;
    query.validate::<E>()?;

    let mut params = Vec::with_capacity(assignments.len() + query.filters().len());
    let mut set_terms = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        match assignment {
            Assignment::Set(col, value) => {
                set_terms.push(format!("{col} = {PLACEHOLDER}"));
                params.push(value.clone());
            }
            Assignment::Increment(col, by) => {
                set_terms.push(format!("{col} = {col} + {PLACEHOLDER}"));
                params.push(ParamValue::I64(*by));
            }
        }
    }

    let mut sql = format!(
        "UPDATE {table} SET {set_clause}",
        table = E::TABLE,
        set_clause = set_terms.join(", ")
    );
    params.extend(push_where(&mut sql, query));
    Ok((sql, params))
}
