//! Database driver contract.
//!
//! The convergence engine only needs a handful of operations from the
//! database: list tables, describe columns and indexes, probe storage
//! engines and run a statement. [`MySqlDriver`] implements them over a
//! `sqlx` pool; [`MemoryDriver`] keeps everything in memory.

mod memory;
mod mysql;

pub use memory::{MemoryDriver, MemoryTable, column_info};
pub use mysql::MySqlDriver;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::Result;
use crate::schema::TypeInfo;

/// Key flag reported for a column (`COLUMN_KEY` in MySQL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnKey {
    /// Not indexed, or only as a later column of a multi-column index.
    #[default]
    None,
    /// Part of the primary key.
    Primary,
    /// First column of a unique index.
    Unique,
    /// First column of a non-unique index.
    Multiple,
}

impl ColumnKey {
    /// Parses the server's key flag.
    #[must_use]
    pub fn parse(flag: &str) -> Self {
        match flag.trim().to_ascii_uppercase().as_str() {
            "PRI" => Self::Primary,
            "UNI" => Self::Unique,
            "MUL" => Self::Multiple,
            _ => Self::None,
        }
    }
}

/// A column as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnInfo {
    /// Base data type (`int`, `varchar`, `enum`, ...).
    pub data_type: String,
    /// Length or display width.
    pub length: Option<u32>,
    /// Precision (scale) of fixed/floating point types.
    pub precision: Option<u32>,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default value as text; `None` if there is none (or it is NULL).
    pub default: Option<String>,
    /// Key flag.
    pub key: ColumnKey,
    /// Whether the column auto-increments.
    pub auto_increment: bool,
    /// Whether the numeric column is unsigned.
    pub unsigned: bool,
    /// Collation name.
    pub collation: Option<String>,
    /// Options of an `enum` or `set` column.
    pub enum_options: Vec<String>,
}

/// One row of an index listing (one column of one index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    /// Index name (`PRIMARY` for the primary key).
    pub key_name: String,
    /// Indexed column.
    pub column_name: String,
    /// Whether duplicates are allowed.
    pub non_unique: bool,
    /// Index type (`BTREE`, `FULLTEXT`, ...).
    pub index_type: String,
    /// 1-based position of the column within the index.
    pub seq_in_index: u32,
}

/// A storage engine offered by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    /// Engine name.
    pub name: String,
    /// Whether the engine is the server default.
    pub is_default: bool,
    /// Whether the engine supports full-text indexes.
    pub supports_fulltext: bool,
}

impl EngineInfo {
    /// Creates an engine entry.
    #[must_use]
    pub fn new(name: impl Into<String>, supports_fulltext: bool) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            supports_fulltext,
        }
    }

    /// Marks the engine as the server default.
    #[must_use]
    pub fn default_engine(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Operations the convergence engine needs from a database connection.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Lists table names, optionally filtered by a `LIKE` pattern.
    async fn list_tables(&self, like: Option<&str>) -> Result<Vec<String>>;

    /// Describes the columns of a table, in table order. A missing table
    /// yields an empty map.
    async fn list_columns(&self, table: &str) -> Result<IndexMap<String, ColumnInfo>>;

    /// Lists the index rows of a table. A missing table yields no rows.
    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexRow>>;

    /// Returns the storage engine of a table.
    async fn table_engine(&self, table: &str) -> Result<Option<String>>;

    /// Returns the storage engines the server supports.
    async fn engines(&self) -> Result<Vec<EngineInfo>>;

    /// Runs a statement.
    async fn query(&self, sql: &str) -> Result<()>;

    /// Classifies a raw type name.
    fn datatype(&self, raw_type: &str) -> Option<TypeInfo>;
}
