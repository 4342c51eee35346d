//! Schema changes.
//!
//! This module defines the changes a convergence run can produce. A
//! [`ChangeSet`] is built fresh for every run, rendered by a dialect and
//! then executed or captured.

use std::fmt;

use crate::schema::{ColumnSpec, IndexSpec};

/// Where a new column is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    /// First column of the table.
    First,
    /// Directly after the named column.
    After(String),
}

/// A single schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    /// Create a new table.
    CreateTable {
        /// Table name.
        table: String,
        /// Column definitions.
        columns: Vec<ColumnSpec>,
        /// Primary, unique, full-text and secondary indexes.
        indexes: Vec<IndexSpec>,
        /// Storage engine.
        engine: Option<String>,
        /// Character set.
        encoding: Option<String>,
    },

    /// Drop a table.
    DropTable {
        /// Table name.
        table: String,
    },

    /// Rename a column, keeping its data.
    RenameColumn {
        /// Table name.
        table: String,
        /// Current column name.
        from: String,
        /// Column definition under the new name.
        column: ColumnSpec,
    },

    /// Add a column to a table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSpec,
        /// Placement of the new column.
        position: ColumnPosition,
        /// Whether the column carries its primary key inline.
        inline_primary: bool,
    },

    /// Change a column's definition.
    ModifyColumn {
        /// Table name.
        table: String,
        /// New column definition.
        column: ColumnSpec,
    },

    /// Drop a column from a table.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Add an index.
    AddIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: IndexSpec,
    },

    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// Whether this is the primary key.
        primary: bool,
    },

    /// Switch the storage engine.
    ChangeEngine {
        /// Table name.
        table: String,
        /// New engine.
        engine: String,
    },

    /// Rewrite existing data after a type change.
    DataMigration {
        /// Human-readable description.
        description: String,
        /// Statement to run.
        sql: String,
    },
}

impl SchemaChange {
    /// Returns the table this change touches, if any.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table }
            | Self::RenameColumn { table, .. }
            | Self::AddColumn { table, .. }
            | Self::ModifyColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AddIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::ChangeEngine { table, .. } => Some(table),
            Self::DataMigration { .. } => None,
        }
    }

    /// Returns true for changes that remove a table, column or index.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DropTable { .. } | Self::DropColumn { .. } | Self::DropIndex { .. }
        )
    }
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table, columns, .. } => {
                write!(f, "create table {} ({} columns)", table, columns.len())
            }
            Self::DropTable { table } => write!(f, "drop table {}", table),
            Self::RenameColumn {
                table,
                from,
                column,
            } => write!(f, "rename column {}.{} to {}", table, from, column.name),
            Self::AddColumn { table, column, .. } => {
                write!(f, "add column {}.{}", table, column.name)
            }
            Self::ModifyColumn { table, column } => {
                write!(f, "modify column {}.{}", table, column.name)
            }
            Self::DropColumn { table, column_name } => {
                write!(f, "drop column {}.{}", table, column_name)
            }
            Self::AddIndex { table, index } => write!(f, "add index {}.{}", table, index.name),
            Self::DropIndex { table, name, .. } => write!(f, "drop index {}.{}", table, name),
            Self::ChangeEngine { table, engine } => {
                write!(f, "change engine of {} to {}", table, engine)
            }
            Self::DataMigration { description, .. } => f.write_str(description),
        }
    }
}

/// Ordered set of changes produced by one convergence run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<SchemaChange>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change.
    pub fn push(&mut self, change: SchemaChange) {
        self.changes.push(change);
    }

    /// Appends several changes.
    pub fn extend(&mut self, changes: impl IntoIterator<Item = SchemaChange>) {
        self.changes.extend(changes);
    }

    /// Returns true if nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Iterates over the changes in emission order.
    pub fn iter(&self) -> std::slice::Iter<'_, SchemaChange> {
        self.changes.iter()
    }

    /// Returns the changes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[SchemaChange] {
        &self.changes
    }
}

impl IntoIterator for ChangeSet {
    type Item = SchemaChange;
    type IntoIter = std::vec::IntoIter<SchemaChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a SchemaChange;
    type IntoIter = std::slice::Iter<'a, SchemaChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_set_order() {
        let mut changes = ChangeSet::new();
        assert!(changes.is_empty());

        changes.push(SchemaChange::DropColumn {
            table: "posts".into(),
            column_name: "legacy".into(),
        });
        changes.push(SchemaChange::ChangeEngine {
            table: "posts".into(),
            engine: "InnoDB".into(),
        });

        assert_eq!(changes.len(), 2);
        let names: Vec<String> = changes.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec!["drop column posts.legacy", "change engine of posts to InnoDB"]
        );
    }

    #[test]
    fn test_destructive() {
        let drop = SchemaChange::DropIndex {
            table: "posts".into(),
            name: "IX_posts_slug".into(),
            primary: false,
        };
        let migration = SchemaChange::DataMigration {
            description: "remap".into(),
            sql: "UPDATE x".into(),
        };

        assert!(drop.is_destructive());
        assert_eq!(drop.table(), Some("posts"));
        assert!(!migration.is_destructive());
        assert_eq!(migration.table(), None);
    }
}
