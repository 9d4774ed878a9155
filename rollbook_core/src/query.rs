//! Backend-agnostic query description: filters, ordering, limit and bulk assignments.
//! Backends render these into SQL; this module only records intent and validates
//! column names against an entity's metadata.

use crate::{Fetchable, ParamValue, RepoError, RepoResult};

/// Sort direction for an ORDER BY term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// A single predicate. Filters on a [`Query`] are combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, ParamValue),
    /// `column LIKE pattern`, with SQL wildcards (`%`, `_`) in the pattern.
    Like(String, String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Like(column.into(), pattern.into())
    }

    /// Matches rows whose `column` contains `needle` anywhere.
    pub fn contains(column: impl Into<String>, needle: &str) -> Self {
        Filter::Like(column.into(), format!("%{needle}%"))
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::Like(c, _) => c,
        }
    }
}

/// One SET term of a bulk update.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `column = value`
    Set(String, ParamValue),
    /// `column = column + by`
    Increment(String, i64),
}

impl Assignment {
    pub fn set(column: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Assignment::Set(column.into(), value.into())
    }

    pub fn increment(column: impl Into<String>, by: i64) -> Self {
        Assignment::Increment(column.into(), by)
    }

    pub fn column(&self) -> &str {
        match self {
            Assignment::Set(c, _) | Assignment::Increment(c, _) => c,
        }
    }
}

/// Builder for the WHERE / ORDER BY / LIMIT part of a statement.
///
/// ```
/// use rollbook_core::{Filter, Query};
///
/// let q = Query::new()
///     .filter(Filter::contains("name", "Alan"))
///     .filter(Filter::eq("grade", 11i64))
///     .order_by_desc("grade")
///     .limit(1);
/// assert_eq!(q.filters().len(), 2);
/// assert_eq!(q.max_rows(), Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
    ordering: Vec<(String, Order)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.ordering.push((column.into(), order));
        self
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by(column, Order::Desc)
    }

    pub fn limit(mut self, rows: usize) -> Self {
        self.limit = Some(rows);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> &[(String, Order)] {
        &self.ordering
    }

    pub fn max_rows(&self) -> Option<usize> {
        self.limit
    }

    /// Every column name this query references, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.filters
            .iter()
            .map(Filter::column)
            .chain(self.ordering.iter().map(|(c, _)| c.as_str()))
    }

    /// Rejects references to columns `E` does not map. Column names are spliced into SQL
    /// text, so nothing reaches a backend before passing this check.
    pub fn validate<E: Fetchable>(&self) -> RepoResult<()> {
        validate_columns::<E, _>(self.columns())
    }
}

/// Checks every name in `columns` against `E::SELECT_COLUMNS`.
pub fn validate_columns<'a, E, I>(columns: I) -> RepoResult<()>
where
    E: Fetchable,
    I: IntoIterator<Item = &'a str>,
{
    for column in columns {
        if !E::has_column(column) {
            return Err(RepoError::invalid_query(format!(
                "unknown column `{column}` for table `{}`",
                E::TABLE
            )));
        }
    }
    Ok(())
}
