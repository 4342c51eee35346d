//! Declarative table-structure convergence for MySQL.
//!
//! `oxide-structure` lets you describe the structure a table should have
//! and brings the live table in line with it:
//! - Missing tables are created with their indexes and a suitable engine
//! - Existing tables are altered column by column, index by index
//! - Changes are additive unless the definition is declared explicit
//! - Statements can be captured for review instead of executed
//!
//! # Architecture
//!
//! - **Builder** - [`builder::Structure`] accumulates the desired table
//! - **Reader** - reads and caches the live columns, indexes and engine
//! - **Diff** - compares both and produces an ordered change set
//! - **Dialect** - renders changes as MySQL statements
//! - **Executor** - runs the statements, or captures them
//! - **Driver** - the database connection ([`driver::MySqlDriver`])
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oxide_structure::prelude::*;
//!
//! let driver = Arc::new(MySqlDriver::connect("mysql://root@localhost/app").await?);
//! let mut structure = Structure::new(driver, StructureConfig::default());
//!
//! structure
//!     .table("posts", None)
//!     .primary("id")
//!     .column("title", "varchar(200)", false, &["unique"])
//!     .column("body", "text", true, &["fulltext"])
//!     .column("state", ["draft", "live"], "draft", &["index"]);
//!
//! // ALTER/CREATE statements that were run; empty if nothing changed.
//! let statements = structure.converge(false, false).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Converge a table from a JSON definition
//! oxide-structure converge --definition posts.json
//!
//! # Print the statements without running them
//! oxide-structure converge --definition posts.json --dry-run --explicit
//!
//! # Show the live structure of a table
//! oxide-structure inspect --table posts
//! ```

pub mod builder;
pub mod config;
pub mod definition;
pub mod dialect;
pub mod diff;
pub mod driver;
pub mod error;
pub mod executor;
pub mod operations;
pub mod reader;
pub mod registry;
pub mod schema;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::Structure;
    pub use crate::config::StructureConfig;
    pub use crate::definition::TableDefinition;
    pub use crate::dialect::{MySqlDialect, StructureDialect};
    pub use crate::diff::{DiffEngine, DiffOptions};
    pub use crate::driver::{DatabaseDriver, MemoryDriver, MySqlDriver};
    pub use crate::error::{Result, StructureError};
    pub use crate::executor::Executor;
    pub use crate::operations::{ChangeSet, ColumnPosition, SchemaChange};
    pub use crate::reader::LiveSchemaReader;
    pub use crate::registry::{DEFAULT_CONNECTION, StructureRegistry};
    pub use crate::schema::{
        ColumnSpec, ColumnType, DefaultValue, IndexSpec, KeyKind, KeyRole, NullDefault, Table,
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::prelude::*;

    #[tokio::test]
    async fn test_prelude_round() {
        let driver = Arc::new(MemoryDriver::new());
        let mut structure = Structure::new(driver.clone(), StructureConfig::default());
        structure
            .table("posts", None)
            .primary("id")
            .column("title", "varchar(200)", false, &["unique"]);

        let changes = structure.plan(false, false).await.unwrap();
        assert_eq!(changes.len(), 1);
        for change in &changes {
            driver.apply(change);
        }
        assert!(structure.plan(false, false).await.unwrap().is_empty());
    }
}
