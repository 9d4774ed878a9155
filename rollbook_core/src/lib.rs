#![forbid(unsafe_code)]
//! Core traits for the rollbook mapping toolkit.
//! This crate is database-agnostic and should not contain any backend-specific logic.

// Re-export for downstream macro expansions and backend adapters.
pub use async_trait::async_trait;

pub mod query;
pub mod schema;

pub use query::{Assignment, Filter, Order, Query};
pub use schema::{CheckDef, ColumnDef, IndexDef, Schema};

/// Text layout used for timestamp columns, both when binding and when reading rows.
/// Matches `NaiveDateTime`'s `Display` output and SQLite's `CURRENT_TIMESTAMP`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Marker trait for types that can be fetched from a database.
/// Implemented via `#[derive(Entity)]` in `rollbook_macros`.
pub trait Fetchable {
    const TABLE: &'static str;
    const SELECT_COLUMNS: &'static [&'static str];

    /// Returns true when `column` is one of the mapped columns of this entity.
    fn has_column(column: &str) -> bool {
        Self::SELECT_COLUMNS.contains(&column)
    }
}

/// A backend-agnostic representation of a database value.
/// Used both for bound parameters and for projected columns read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    I32(i32),
    I64(i64),
    F64(f64),
    Bool(bool),
    Null,
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::I32(i) => Some(i64::from(*i)),
            ParamValue::I64(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::I32(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::I64(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::F64(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

/// Trait for entities that have an identifiable key.
/// This trait exposes the key type and column name so macros can introspect it.
pub trait Identifiable {
    /// The type of the primary key (e.g., `i64`).
    type Key;

    /// The name of the primary key column in the database.
    const ID_COLUMN: &'static str;

    /// Returns a copy of the entity's ID, if it has one.
    fn id(&self) -> Option<Self::Key>;
}

/// Trait for types whose fields can be extracted for an INSERT statement.
pub trait Insertable {
    /// The columns to be used in an INSERT statement, excluding auto-generated keys.
    const INSERT_COLUMNS: &'static [&'static str];

    /// The values of the fields corresponding to `INSERT_COLUMNS`.
    fn insert_values(&self) -> Vec<ParamValue>;
}

/// The storage rule a rejected write ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    Check,
    NotNull,
    Other,
}

/// Lightweight, backend-agnostic error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The entity was not found.
    #[error("entity not found")]
    NotFound,
    /// The query references something the entity does not map, or is otherwise malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The storage engine rejected a write because it violates a declared constraint.
    #[error("constraint violation ({kind:?}): {message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
    /// Error while mapping a backend row into an entity.
    #[error("mapping error")]
    Mapping {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Opaque backend error from the underlying driver or adapter.
    #[error("backend error")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl RepoError {
    /// Wrap a backend/driver error.
    pub fn backend<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RepoError::Backend {
            source: Box::new(e),
        }
    }

    /// Wrap a row-mapping error.
    pub fn mapping<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RepoError::Mapping {
            source: Box::new(e),
        }
    }

    pub fn invalid_query(reason: impl Into<String>) -> Self {
        RepoError::InvalidQuery(reason.into())
    }

    /// The violated constraint kind, when this error is a constraint violation.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            RepoError::Constraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Convenience alias for results returned by repository methods.
pub type RepoResult<T> = Result<T, RepoError>;

/// A minimal, asynchronous repository interface for an entity `T`.
/// Concrete backends provide implementations; every operation is a single pass-through
/// to the storage engine.
#[async_trait]
pub trait Repository<T: Identifiable> {
    /// Fetch an entity by its primary key. Returns Ok(None) if not found.
    async fn find_by_id(&self, id: &T::Key) -> RepoResult<Option<T>>;

    /// Fetch every row of the entity's table.
    async fn find_all(&self) -> RepoResult<Vec<T>>;

    /// Fetch the rows matching `query`, honoring its ordering and limit.
    async fn find(&self, query: &Query) -> RepoResult<Vec<T>>;

    /// Fetch the first row matching `query`, or None when nothing matches.
    async fn first(&self, query: &Query) -> RepoResult<Option<T>>;

    /// Fetch only `columns` for the rows matching `query`, one value vector per row
    /// in the order the columns were requested.
    async fn project(&self, columns: &[&str], query: &Query) -> RepoResult<Vec<Vec<ParamValue>>>;

    /// Count the rows matching `query`. Ordering and limit are ignored.
    async fn count(&self, query: &Query) -> RepoResult<u64>;

    /// Insert a new entity. The returned entity carries storage-generated fields
    /// (e.g., auto-incrementing IDs).
    async fn insert(&self, entity: &T) -> RepoResult<T>;

    /// Insert all entities as one unit: either every row is stored or none is.
    async fn insert_many(&self, entities: &[T]) -> RepoResult<Vec<T>>;

    /// Apply `assignments` to every row matching `query`. Returns the affected row count.
    async fn update_all(&self, assignments: &[Assignment], query: &Query) -> RepoResult<u64>;
}

/// A tiny adapter for mapping a backend-specific row type into an entity `T`.
#[allow(clippy::wrong_self_convention)]
pub trait RowAdapter<T> {
    type Row;
    fn from_row(&self, row: &Self::Row) -> RepoResult<T>;
}
