//! Schema representation types.
//!
//! These types describe columns, keys and tables. The same shapes are used
//! for the desired structure (built through [`crate::builder::Structure`])
//! and for the structure introspected from the live database, so both sides
//! can be rendered and compared with the same code.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Portable class of a SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeClass {
    /// Integer types.
    Int,
    /// Floating point and fixed point types.
    Float,
    /// Character and text types.
    String,
    /// Boolean (`tinyint(1)` and its aliases).
    Bool,
    /// `enum` and `set`.
    Enum,
    /// Date and time types.
    Date,
    /// Binary types.
    Binary,
}

/// Classification of a raw dialect type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Portable type class.
    pub class: TypeClass,
    /// Smallest storable value for numeric types.
    pub min: Option<i128>,
    /// Largest storable value for numeric types.
    pub max: Option<i128>,
    /// Whether the type stores raw bytes.
    pub is_binary: bool,
    /// Maximum length in bytes or characters, if bounded.
    pub max_length: Option<u64>,
}

impl TypeInfo {
    /// Creates type info for a class with no bounds.
    #[must_use]
    pub fn new(class: TypeClass) -> Self {
        Self {
            class,
            min: None,
            max: None,
            is_binary: false,
            max_length: None,
        }
    }

    /// Sets the numeric range.
    #[must_use]
    pub fn range(mut self, min: i128, max: i128) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Marks the type as binary.
    #[must_use]
    pub fn binary(mut self) -> Self {
        self.is_binary = true;
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub fn max_length(mut self, max_length: u64) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Returns true for integer types.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.class == TypeClass::Int
    }

    /// Returns true for types whose defaults are rendered unquoted.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self.class, TypeClass::Int | TypeClass::Float | TypeClass::Bool)
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum DefaultValue {
    /// No default value.
    #[default]
    None,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// Literal text default.
    Text(String),
    /// Raw SQL expression (e.g. `CURRENT_TIMESTAMP`), emitted verbatim.
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
        }
    }

    /// Returns true if no default is set.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Re-types the value so that it renders the same way the server
    /// reports it for a column of the given class.
    #[must_use]
    pub fn normalize_for(self, info: &TypeInfo) -> Self {
        match self {
            Self::Text(text) if info.is_numeric() => match parse_number(&text) {
                Some(number) => number,
                None => Self::Text(text),
            },
            Self::Text(text) if info.class == TypeClass::Date && is_expression(&text) => {
                Self::Expression(text)
            }
            Self::Bool(b) if !info.is_numeric() => Self::Text(if b { "1" } else { "0" }.into()),
            Self::Bool(b) => Self::Integer(i64::from(b)),
            Self::Integer(i) if !info.is_numeric() => Self::Text(i.to_string()),
            Self::Float(f) if !info.is_numeric() => Self::Text(f.to_string()),
            other => other,
        }
    }
}

/// Returns true if a date default is an SQL expression rather than a literal,
/// such as `CURRENT_TIMESTAMP` or `now()`.
#[must_use]
pub fn is_expression(default: &str) -> bool {
    let upper = default.trim().to_ascii_uppercase();
    upper.starts_with("CURRENT_TIMESTAMP") || upper.ends_with(')')
}

/// Parses numeric text into an integer or float default.
#[must_use]
pub fn parse_number(text: &str) -> Option<DefaultValue> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Some(DefaultValue::Integer(i));
    }
    if text.contains(['e', 'E', 'i', 'n', 'N']) {
        // Rejects "inf"/"NaN" and exponent forms the server never reports.
        return None;
    }
    text.parse::<f64>().ok().map(DefaultValue::Float)
}

/// Kind of key a column takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyKind {
    /// Primary key.
    Primary,
    /// Unique index.
    Unique,
    /// Plain index.
    Index,
    /// Plain key (`foreign` is accepted as an alias).
    Key,
    /// Full-text index.
    Fulltext,
}

impl KeyKind {
    /// Parses a role name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(Self::Primary),
            "unique" => Some(Self::Unique),
            "index" => Some(Self::Index),
            "key" | "foreign" => Some(Self::Key),
            "fulltext" => Some(Self::Fulltext),
            _ => None,
        }
    }

    /// Prefix used in generated index names.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::Unique => "UX",
            Self::Index => "IX",
            Self::Key => "KX",
            Self::Fulltext => "FT",
        }
    }

    /// Whether ungrouped roles of this kind share one index per table.
    #[must_use]
    pub fn is_multi_value(self) -> bool {
        matches!(self, Self::Primary | Self::Unique | Self::Fulltext)
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary => "primary",
            Self::Unique => "unique",
            Self::Index => "index",
            Self::Key => "key",
            Self::Fulltext => "fulltext",
        };
        f.write_str(name)
    }
}

/// A key role of a column, optionally tagged with a group for
/// multi-column indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRole {
    /// Kind of key.
    pub kind: KeyKind,
    /// Index group, for indexes spanning several columns.
    pub group: Option<String>,
}

impl KeyRole {
    /// Creates an ungrouped role.
    #[must_use]
    pub fn new(kind: KeyKind) -> Self {
        Self { kind, group: None }
    }

    /// Creates a grouped role.
    #[must_use]
    pub fn grouped(kind: KeyKind, group: impl Into<String>) -> Self {
        Self {
            kind,
            group: Some(group.into()),
        }
    }

    /// Parses `"role"` or `"role.group"`.
    #[must_use]
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.split_once('.') {
            Some((kind, group)) if !group.trim().is_empty() => {
                KeyKind::parse(kind).map(|kind| Self::grouped(kind, group.trim()))
            }
            Some(_) => None,
            None => KeyKind::parse(spec).map(Self::new),
        }
    }
}

/// Desired or introspected column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Lower-case base type name (`int`, `varchar`, `enum`, ...).
    pub sql_type: String,
    /// Length or display width.
    pub length: Option<u32>,
    /// Precision (scale) for fixed/floating point types.
    pub precision: Option<u32>,
    /// Values of an `enum` or `set` column.
    pub enum_values: Vec<String>,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default value.
    pub default: DefaultValue,
    /// Whether the numeric column is unsigned.
    pub unsigned: bool,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Keys this column takes part in.
    pub key_roles: Vec<KeyRole>,
}

impl ColumnSpec {
    /// Creates a nullable column of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into().to_ascii_lowercase(),
            length: None,
            precision: None,
            enum_values: Vec::new(),
            nullable: true,
            default: DefaultValue::None,
            unsigned: false,
            auto_increment: false,
            key_roles: Vec::new(),
        }
    }

    /// Sets the length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the precision.
    #[must_use]
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Sets the enum/set values.
    #[must_use]
    pub fn values<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Marks the column unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Adds a key role.
    #[must_use]
    pub fn key(mut self, role: KeyRole) -> Self {
        if !self.key_roles.contains(&role) {
            self.key_roles.push(role);
        }
        self
    }

    /// Returns true if the column holds a role of the given kind.
    #[must_use]
    pub fn has_role(&self, kind: KeyKind) -> bool {
        self.key_roles.iter().any(|r| r.kind == kind)
    }

    /// Returns true for the single, plain auto-increment primary key, which
    /// is rendered inline with its column.
    #[must_use]
    pub fn is_plain_auto_primary(&self) -> bool {
        self.auto_increment
            && self
                .key_roles
                .iter()
                .any(|r| r.kind == KeyKind::Primary && r.group.is_none())
    }
}

/// Desired or introspected index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name (`PRIMARY` for the primary key).
    pub name: String,
    /// Kind of index.
    pub kind: KeyKind,
    /// Indexed columns, in index order.
    pub columns: Vec<String>,
}

impl IndexSpec {
    /// Name of the primary key index.
    pub const PRIMARY: &'static str = "PRIMARY";

    /// Creates an index.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: KeyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: Vec::new(),
        }
    }

    /// Synthesizes the index name for a role on a table.
    #[must_use]
    pub fn name_for(table: &str, role: &KeyRole, column: &str) -> String {
        match (role.kind, &role.group) {
            (KeyKind::Primary, _) => Self::PRIMARY.to_string(),
            (kind, Some(group)) => format!("{}_{}_{}", kind.prefix(), table, group),
            (kind, None) if kind.is_multi_value() => format!("{}_{}", kind.prefix(), table),
            (kind, None) => format!("{}_{}_{}", kind.prefix(), table, column),
        }
    }
}

/// Column type as given to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Shorthand type string such as `"uint(10)"` or `"varchar(200)"`.
    Named(String),
    /// Enum values.
    Enum(Vec<String>),
    /// Set values.
    Set(Vec<String>),
}

impl ColumnType {
    /// Creates a `set` type.
    #[must_use]
    pub fn set<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::Set(values.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for ColumnType {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for ColumnType {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl From<Vec<&str>> for ColumnType {
    fn from(values: Vec<&str>) -> Self {
        Self::Enum(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ColumnType {
    fn from(values: Vec<String>) -> Self {
        Self::Enum(values)
    }
}

impl<const N: usize> From<[&str; N]> for ColumnType {
    fn from(values: [&str; N]) -> Self {
        Self::Enum(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// Nullability and default of a declared column.
#[derive(Debug, Clone, PartialEq)]
pub enum NullDefault {
    /// Nullable, no default.
    Nullable,
    /// Not null, no default.
    NotNull,
    /// Not null with the given default.
    Default(DefaultValue),
    /// Explicit nullability and default.
    Explicit {
        /// Whether NULL is allowed.
        nullable: bool,
        /// Default value.
        default: DefaultValue,
    },
}

impl NullDefault {
    /// Splits into `(nullable, default)`.
    #[must_use]
    pub fn into_parts(self) -> (bool, DefaultValue) {
        match self {
            Self::Nullable => (true, DefaultValue::None),
            Self::NotNull => (false, DefaultValue::None),
            Self::Default(default) => (false, default),
            Self::Explicit { nullable, default } => (nullable, default),
        }
    }
}

impl From<bool> for NullDefault {
    fn from(nullable: bool) -> Self {
        if nullable { Self::Nullable } else { Self::NotNull }
    }
}

impl From<i64> for NullDefault {
    fn from(value: i64) -> Self {
        Self::Default(DefaultValue::Integer(value))
    }
}

impl From<i32> for NullDefault {
    fn from(value: i32) -> Self {
        Self::Default(DefaultValue::Integer(i64::from(value)))
    }
}

impl From<f64> for NullDefault {
    fn from(value: f64) -> Self {
        Self::Default(DefaultValue::Float(value))
    }
}

impl From<&str> for NullDefault {
    fn from(value: &str) -> Self {
        Self::Default(DefaultValue::Text(value.to_string()))
    }
}

impl From<String> for NullDefault {
    fn from(value: String) -> Self {
        Self::Default(DefaultValue::Text(value))
    }
}

impl From<DefaultValue> for NullDefault {
    fn from(value: DefaultValue) -> Self {
        Self::Default(value)
    }
}

/// A storage engine requested through the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    /// Engine name as given.
    pub name: String,
    /// Whether to ignore the request if the server lacks the engine.
    pub check_availability: bool,
}

/// Desired table state accumulated by the builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Table name without prefix.
    pub name: String,
    /// Table-name prefix.
    pub prefix: String,
    /// Character set.
    pub encoding: Option<String>,
    /// Requested storage engine (`None` = auto-select).
    pub engine: Option<EngineRequest>,
    /// Desired columns, in declared order.
    pub columns: IndexMap<String, ColumnSpec>,
    /// Pending column renames `(from, to)`.
    pub renames: Vec<(String, String)>,
}

impl Table {
    /// Creates an empty table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the prefixed table name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }

    /// Returns true if any column requests the given key kind.
    #[must_use]
    pub fn requests(&self, kind: KeyKind) -> bool {
        self.columns.values().any(|c| c.has_role(kind))
    }
}
