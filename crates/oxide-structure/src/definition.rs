//! JSON table definitions.
//!
//! ```json
//! {
//!   "name": "posts",
//!   "engine": "InnoDB",
//!   "columns": [
//!     { "name": "id", "primary": true },
//!     { "name": "title", "type": "varchar(200)", "null": false, "keys": ["unique"] },
//!     { "name": "state", "type": ["draft", "live"], "null": "draft" },
//!     { "name": "note", "type": "text", "null": { "null": true, "default": "" } }
//!   ],
//!   "renames": [{ "from": "heading", "to": "title" }]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::builder::Structure;
use crate::error::{Result, StructureError};
use crate::schema::{ColumnType, DefaultValue, NullDefault};

/// A table as described in a definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name without prefix.
    pub name: String,
    /// Overrides the configured table prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Character set used when the table is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Requested storage engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Fall back to automatic engine selection when `engine` is missing on
    /// the server.
    #[serde(default = "default_true")]
    pub check_engine: bool,
    /// Columns in table order.
    pub columns: Vec<ColumnDefinition>,
    /// Renames applied before the columns are reconciled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub renames: Vec<RenameDefinition>,
}

/// One column of a [`TableDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Column type; optional for primary keys, which default to `int(10)`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<TypeDefinition>,
    /// Nullability and default.
    #[serde(default)]
    pub null: NullDefinition,
    /// Key roles such as `unique` or `index.by_date`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Declares the column as the primary key.
    #[serde(default)]
    pub primary: bool,
}

/// Column type: a shorthand string or a list of enum values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDefinition {
    /// Shorthand such as `"varchar(200)"` or `"uint"`.
    Named(String),
    /// Enum options.
    Values(Vec<String>),
}

/// Nullability and default of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NullDefinition {
    /// `true` is nullable, `false` is NOT NULL; neither has a default.
    Nullable(bool),
    /// `{"null": ..., "default": ...}`.
    Explicit {
        /// Whether the column accepts NULL.
        null: bool,
        /// Default value; `null` for none.
        #[serde(default)]
        default: Value,
    },
    /// Any other scalar is a NOT NULL column's default.
    Default(Value),
}

impl Default for NullDefinition {
    fn default() -> Self {
        Self::Nullable(true)
    }
}

/// A column rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameDefinition {
    /// Current column name.
    pub from: String,
    /// New column name.
    pub to: String,
}

fn default_true() -> bool {
    true
}

fn default_value(value: &Value) -> DefaultValue {
    match value {
        Value::Null => DefaultValue::None,
        Value::Bool(b) => DefaultValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => DefaultValue::Integer(i),
            None => n
                .as_f64()
                .map_or_else(|| DefaultValue::Text(n.to_string()), DefaultValue::Float),
        },
        Value::String(s) => DefaultValue::Text(s.clone()),
        other => DefaultValue::Text(other.to_string()),
    }
}

impl NullDefinition {
    fn to_null_default(&self) -> NullDefault {
        match self {
            Self::Nullable(nullable) => NullDefault::from(*nullable),
            Self::Explicit { null, default } => NullDefault::Explicit {
                nullable: *null,
                default: default_value(default),
            },
            Self::Default(Value::Null) => NullDefault::Nullable,
            Self::Default(value) => NullDefault::Default(default_value(value)),
        }
    }
}

impl TableDefinition {
    /// Parses a definition from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a definition file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| StructureError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Declares the table on a builder.
    pub fn apply(&self, structure: &mut Structure) -> Result<()> {
        structure.table(&self.name, self.encoding.as_deref());
        if let Some(prefix) = &self.prefix {
            structure.prefix(prefix);
        }
        if let Some(engine) = &self.engine {
            structure.engine(engine, self.check_engine);
        }

        for column in &self.columns {
            if column.primary {
                match &column.column_type {
                    Some(TypeDefinition::Named(ty)) => structure.primary_typed(&column.name, ty),
                    Some(TypeDefinition::Values(_)) => {
                        return Err(StructureError::MissingDefinition(format!(
                            "primary key '{}' cannot be an enum",
                            column.name
                        )));
                    }
                    None => structure.primary(&column.name),
                };
                continue;
            }

            let column_type = match &column.column_type {
                Some(TypeDefinition::Named(ty)) => ColumnType::Named(ty.clone()),
                Some(TypeDefinition::Values(values)) => ColumnType::Enum(values.clone()),
                None => {
                    return Err(StructureError::MissingDefinition(format!(
                        "column '{}' has no type",
                        column.name
                    )));
                }
            };
            let keys: Vec<&str> = column.keys.iter().map(String::as_str).collect();
            structure.column(
                &column.name,
                column_type,
                column.null.to_null_default(),
                &keys,
            );
        }

        for rename in &self.renames {
            structure.rename_column(&rename.from, &rename.to);
        }
        Ok(())
    }
}
