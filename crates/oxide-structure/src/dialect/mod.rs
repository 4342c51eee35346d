//! Database dialect implementations.
//!
//! Each dialect knows the types its server accepts and how to render
//! columns, indexes and schema changes as SQL.

mod mysql;

pub use mysql::MySqlDialect;

use crate::operations::SchemaChange;
use crate::schema::{ColumnSpec, IndexSpec, KeyKind, TypeInfo};

/// Trait for database-specific SQL generation.
pub trait StructureDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Classifies a raw type name. Returns `None` for types the dialect
    /// does not accept.
    fn type_info(&self, raw_type: &str) -> Option<TypeInfo>;

    /// Generates SQL for a schema change.
    fn generate_sql(&self, change: &SchemaChange) -> Vec<String>;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Renders the type part of a column definition.
    fn type_definition(&self, column: &ColumnSpec) -> String {
        let mut sql = column.sql_type.clone();

        match (column.length, column.precision) {
            (Some(length), Some(precision)) => {
                sql.push_str(&format!("({},{})", length, precision));
            }
            (Some(length), None) => sql.push_str(&format!("({})", length)),
            _ => {}
        }

        if !column.enum_values.is_empty() {
            let values: Vec<String> = column
                .enum_values
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .collect();
            sql.push_str(&format!("({})", values.join(",")));
        }

        if column.unsigned {
            sql.push_str(" unsigned");
        }

        sql
    }

    /// Generates the column definition.
    ///
    /// With `inline_primary` the plain auto-increment primary key is
    /// declared on the column itself.
    fn column_definition(&self, column: &ColumnSpec, inline_primary: bool) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_definition(column),
        ];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default_sql) = column.default.to_sql() {
            parts.push(format!("DEFAULT {}", default_sql));
        }

        if column.auto_increment {
            parts.push(self.auto_increment_keyword().to_string());
            if inline_primary {
                parts.push("PRIMARY KEY".to_string());
            }
        }

        parts.join(" ")
    }

    /// Renders an index as it appears inside `CREATE TABLE` or after
    /// `ALTER TABLE ... ADD`.
    fn index_fragment(&self, index: &IndexSpec) -> String {
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect();
        let columns = columns.join(", ");

        match index.kind {
            KeyKind::Primary => format!("PRIMARY KEY ({})", columns),
            KeyKind::Unique => format!(
                "UNIQUE INDEX {} ({})",
                self.quote_identifier(&index.name),
                columns
            ),
            KeyKind::Fulltext => format!(
                "FULLTEXT INDEX {} ({})",
                self.quote_identifier(&index.name),
                columns
            ),
            // KEY and INDEX are synonyms; introspection cannot tell them apart.
            KeyKind::Index | KeyKind::Key => format!(
                "INDEX {} ({})",
                self.quote_identifier(&index.name),
                columns
            ),
        }
    }

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;
}
