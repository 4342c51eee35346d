//! MySQL dialect.
//!
//! Identifiers are backtick-quoted. Every change is rendered as its own
//! statement so a failure points at exactly one clause.

use crate::operations::{ColumnPosition, SchemaChange};
use crate::schema::{ColumnSpec, IndexSpec, KeyKind, TypeClass, TypeInfo};

use super::StructureDialect;

/// MySQL structure dialect.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generates SQL for creating a table.
    fn create_table_sql(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        indexes: &[IndexSpec],
        engine: Option<&str>,
        encoding: Option<&str>,
    ) -> String {
        let inline = inline_primary(columns, indexes);

        let mut defs: Vec<String> = columns
            .iter()
            .map(|c| self.column_definition(c, inline == Some(c.name.as_str())))
            .collect();

        for index in indexes {
            if index.kind == KeyKind::Primary && inline.is_some() {
                continue;
            }
            defs.push(self.index_fragment(index));
        }

        let mut sql = format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(table),
            defs.join(",\n  ")
        );
        if let Some(engine) = engine {
            sql.push_str(&format!(" ENGINE={}", engine));
        }
        if let Some(encoding) = encoding {
            sql.push_str(&format!(" DEFAULT CHARSET={}", encoding));
        }
        sql
    }

    fn alter(&self, table: &str, clause: &str) -> String {
        format!("ALTER TABLE {} {}", self.quote_identifier(table), clause)
    }
}

/// Returns the column whose primary key is declared inline, if the table's
/// primary key is exactly one plain auto-increment column.
fn inline_primary<'a>(columns: &'a [ColumnSpec], indexes: &[IndexSpec]) -> Option<&'a str> {
    let primary = indexes.iter().find(|i| i.kind == KeyKind::Primary)?;
    if primary.columns.len() != 1 {
        return None;
    }
    columns
        .iter()
        .find(|c| c.name == primary.columns[0] && c.is_plain_auto_primary())
        .map(|c| c.name.as_str())
}

impl StructureDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn type_info(&self, raw_type: &str) -> Option<TypeInfo> {
        let base = raw_type
            .split(['(', ' '])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let info = match base.as_str() {
            "tinyint" => TypeInfo::new(TypeClass::Int).range(-128, 127),
            "smallint" => TypeInfo::new(TypeClass::Int).range(-32_768, 32_767),
            "mediumint" => TypeInfo::new(TypeClass::Int).range(-8_388_608, 8_388_607),
            "int" | "integer" => {
                TypeInfo::new(TypeClass::Int).range(i128::from(i32::MIN), i128::from(i32::MAX))
            }
            "bigint" => {
                TypeInfo::new(TypeClass::Int).range(i128::from(i64::MIN), i128::from(i64::MAX))
            }
            "bit" => TypeInfo::new(TypeClass::Int).range(0, i128::from(u64::MAX)),
            "bool" | "boolean" => TypeInfo::new(TypeClass::Bool).range(0, 1),
            "decimal" | "numeric" | "dec" | "fixed" | "float" | "double" | "real" => {
                TypeInfo::new(TypeClass::Float)
            }
            "char" => TypeInfo::new(TypeClass::String).max_length(255),
            "varchar" => TypeInfo::new(TypeClass::String).max_length(65_535),
            "tinytext" => TypeInfo::new(TypeClass::String).max_length(255),
            "text" => TypeInfo::new(TypeClass::String).max_length(65_535),
            "mediumtext" => TypeInfo::new(TypeClass::String).max_length(16_777_215),
            "longtext" => TypeInfo::new(TypeClass::String).max_length(4_294_967_295),
            "json" => TypeInfo::new(TypeClass::String),
            "binary" => TypeInfo::new(TypeClass::Binary).binary().max_length(255),
            "varbinary" => TypeInfo::new(TypeClass::Binary).binary().max_length(65_535),
            "tinyblob" => TypeInfo::new(TypeClass::Binary).binary().max_length(255),
            "blob" => TypeInfo::new(TypeClass::Binary).binary().max_length(65_535),
            "mediumblob" => TypeInfo::new(TypeClass::Binary)
                .binary()
                .max_length(16_777_215),
            "longblob" => TypeInfo::new(TypeClass::Binary)
                .binary()
                .max_length(4_294_967_295),
            "enum" | "set" => TypeInfo::new(TypeClass::Enum),
            "date" | "datetime" | "timestamp" | "time" | "year" => TypeInfo::new(TypeClass::Date),
            _ => return None,
        };
        Some(info)
    }

    fn generate_sql(&self, change: &SchemaChange) -> Vec<String> {
        match change {
            SchemaChange::CreateTable {
                table,
                columns,
                indexes,
                engine,
                encoding,
            } => vec![self.create_table_sql(
                table,
                columns,
                indexes,
                engine.as_deref(),
                encoding.as_deref(),
            )],

            SchemaChange::DropTable { table } => {
                vec![format!("DROP TABLE {}", self.quote_identifier(table))]
            }

            SchemaChange::RenameColumn {
                table,
                from,
                column,
            } => vec![self.alter(
                table,
                &format!(
                    "CHANGE COLUMN {} {}",
                    self.quote_identifier(from),
                    self.column_definition(column, false)
                ),
            )],

            SchemaChange::AddColumn {
                table,
                column,
                position,
                inline_primary,
            } => {
                let position = match position {
                    ColumnPosition::First => "FIRST".to_string(),
                    ColumnPosition::After(prev) => {
                        format!("AFTER {}", self.quote_identifier(prev))
                    }
                };
                vec![self.alter(
                    table,
                    &format!(
                        "ADD COLUMN {} {}",
                        self.column_definition(column, *inline_primary),
                        position
                    ),
                )]
            }

            SchemaChange::ModifyColumn { table, column } => vec![self.alter(
                table,
                &format!("MODIFY COLUMN {}", self.column_definition(column, false)),
            )],

            SchemaChange::DropColumn { table, column_name } => vec![self.alter(
                table,
                &format!("DROP COLUMN {}", self.quote_identifier(column_name)),
            )],

            SchemaChange::AddIndex { table, index } => {
                vec![self.alter(table, &format!("ADD {}", self.index_fragment(index)))]
            }

            SchemaChange::DropIndex {
                table,
                name,
                primary,
            } => {
                if *primary {
                    vec![self.alter(table, "DROP PRIMARY KEY")]
                } else {
                    vec![self.alter(
                        table,
                        &format!("DROP INDEX {}", self.quote_identifier(name)),
                    )]
                }
            }

            SchemaChange::ChangeEngine { table, engine } => {
                vec![self.alter(table, &format!("ENGINE={}", engine))]
            }

            SchemaChange::DataMigration { sql, .. } => vec![sql.clone()],
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }
}
