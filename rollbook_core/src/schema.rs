//! Table shape metadata generated by `#[derive(Entity)]` and rendered into DDL by
//! `rollbook_sql_builder`.

use crate::Fetchable;

/// One mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    /// Declared SQL type, e.g. `INTEGER`, `TEXT`, `TIMESTAMP`.
    pub sql_type: &'static str,
    pub nullable: bool,
    pub primary_key: bool,
    /// Name of the UNIQUE constraint covering this column alone.
    pub unique: Option<&'static str>,
    /// Maximum character length; rendered as `VARCHAR(n)` plus a length CHECK.
    pub max_length: Option<u32>,
    /// Raw SQL default expression.
    pub default: Option<&'static str>,
}

impl ColumnDef {
    /// Column with no constraints beyond its type.
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
            primary_key: false,
            unique: None,
            max_length: None,
            default: None,
        }
    }
}

/// A named table-level CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckDef {
    pub name: &'static str,
    pub expr: &'static str,
}

/// A named secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

/// Full table declaration of an entity.
pub trait Schema: Fetchable {
    const COLUMNS: &'static [ColumnDef];
    /// Name given to the primary key constraint, if any.
    const PRIMARY_KEY_NAME: Option<&'static str>;
    const CHECKS: &'static [CheckDef];
    const INDEXES: &'static [IndexDef];

    fn column(name: &str) -> Option<&'static ColumnDef> {
        Self::COLUMNS.iter().find(|c| c.name == name)
    }
}
