#![forbid(unsafe_code)]
//! Facade crate for `rollbook`: re-exports the core traits and the `Entity` derive,
//! and carries the student roster built on top of them.
//!
//! # Example: Deriving `Entity`
//!
//! The `#[derive(Entity)]` macro generates compile-time metadata about your entity,
//! its table schema and a default `RowAdapter` implementation.
//! ```ignore
//! // Non-runnable: the generated adapter needs the consumer's `backend-adapters` feature.
//! use rollbook::{Entity, Fetchable, Schema};
//!
//! #[derive(Entity, Clone, Debug)]
//! #[entity(check(name = "positive_pages", expr = "pages > 0"))]
//! pub struct Book {
//!     #[fetch(id)]
//!     pub id: Option<i64>,
//!     #[fetch(unique = "unique_isbn", max_length = 13)]
//!     pub isbn: String,
//!     pub pages: i64,
//! }
//!
//! assert_eq!(Book::TABLE, "books");
//! assert_eq!(Book::SELECT_COLUMNS, &["id", "isbn", "pages"]);
//! assert_eq!(Book::CHECKS[0].name, "positive_pages");
//! let _adapter = BookRowAdapter;
//! ```
//!
//! # Example: The roster
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! let config = rollbook::RollbookConfig::load()?;
//! let report = rollbook::roster::run(&config).await?;
//! println!("{:?}", report.name_grades());
//! # Ok(())
//! # }
//! ```

// Re-export all core traits.
pub use rollbook_core::{
    Assignment, CheckDef, ColumnDef, ConstraintKind, Fetchable, Filter, Identifiable, IndexDef,
    Insertable, Order, ParamValue, Query, RepoError, RepoResult, Repository, RowAdapter, Schema,
};

// Re-export the derive macro.
pub use rollbook_macros::Entity;

// Optional re-export of the SQL builder helpers.
#[cfg(feature = "sql-builder")]
pub use rollbook_sql_builder as sql_builder;

pub mod config;
pub mod logging;
#[cfg(feature = "backend-adapters")]
pub mod roster;
pub mod student;

pub use config::{ConfigError, RollbookConfig};
pub use student::Student;

// Backend types re-exported under a neutral namespace, so end-users don't
// have to depend on backend crates directly.
pub mod backends {
    #[cfg(feature = "libsql-backend")]
    pub use rollbook_libsql::{LibsqlRepository, LibsqlSession};
}
