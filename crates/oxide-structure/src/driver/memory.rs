//! In-memory driver.
//!
//! Holds table structures in memory and records every statement it is
//! asked to run. Useful for planning without a server and for tests;
//! [`MemoryDriver::apply`] mirrors a [`SchemaChange`] into the stored
//! structure the way the server would after running its SQL.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::dialect::{MySqlDialect, StructureDialect};
use crate::error::{Result, StructureError};
use crate::operations::{ColumnPosition, SchemaChange};
use crate::schema::{ColumnSpec, DefaultValue, IndexSpec, KeyKind, TypeInfo};

use super::{ColumnInfo, ColumnKey, DatabaseDriver, EngineInfo, IndexRow};

/// Structure of one in-memory table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    /// Columns, in table order.
    pub columns: IndexMap<String, ColumnInfo>,
    /// Index rows.
    pub indexes: Vec<IndexRow>,
    /// Storage engine.
    pub engine: Option<String>,
}

impl MemoryTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, info: ColumnInfo) -> Self {
        self.columns.insert(name.into(), info);
        self.refresh_keys();
        self
    }

    /// Adds an index over the given columns.
    #[must_use]
    pub fn index(mut self, name: &str, kind: KeyKind, columns: &[&str]) -> Self {
        let mut index = IndexSpec::new(name, kind);
        index.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.add_index(&index);
        self
    }

    /// Sets the storage engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    fn add_index(&mut self, index: &IndexSpec) {
        for (seq, column) in index.columns.iter().enumerate() {
            self.indexes.push(IndexRow {
                key_name: index.name.clone(),
                column_name: column.clone(),
                non_unique: !matches!(index.kind, KeyKind::Primary | KeyKind::Unique),
                index_type: if index.kind == KeyKind::Fulltext {
                    "FULLTEXT".to_string()
                } else {
                    "BTREE".to_string()
                },
                seq_in_index: u32::try_from(seq + 1).unwrap_or(u32::MAX),
            });
        }
        self.refresh_keys();
    }

    fn drop_index(&mut self, name: &str) {
        self.indexes.retain(|r| r.key_name != name);
        self.refresh_keys();
    }

    /// Recomputes the key flag of every column from the index rows.
    fn refresh_keys(&mut self) {
        for (name, info) in &mut self.columns {
            let leading: Vec<&IndexRow> = self
                .indexes
                .iter()
                .filter(|r| &r.column_name == name && r.seq_in_index == 1)
                .collect();
            let in_primary = self
                .indexes
                .iter()
                .any(|r| &r.column_name == name && r.key_name == IndexSpec::PRIMARY);

            info.key = if in_primary {
                ColumnKey::Primary
            } else if leading.iter().any(|r| !r.non_unique) {
                ColumnKey::Unique
            } else if !leading.is_empty() {
                ColumnKey::Multiple
            } else {
                ColumnKey::None
            };
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    queries: Vec<String>,
    failures: Vec<String>,
}

/// In-memory implementation of [`DatabaseDriver`].
pub struct MemoryDriver {
    state: Mutex<MemoryState>,
    engines: Vec<EngineInfo>,
    dialect: MySqlDialect,
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDriver {
    /// Creates an empty database offering InnoDB (default), MyISAM and
    /// MEMORY.
    #[must_use]
    pub fn new() -> Self {
        Self::with_engines(vec![
            EngineInfo::new("InnoDB", true).default_engine(),
            EngineInfo::new("MyISAM", true),
            EngineInfo::new("MEMORY", false),
        ])
    }

    /// Creates an empty database offering the given engines.
    #[must_use]
    pub fn with_engines(engines: Vec<EngineInfo>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            engines,
            dialect: MySqlDialect::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a table.
    pub fn add_table(&self, name: impl Into<String>, table: MemoryTable) {
        self.state().tables.insert(name.into(), table);
    }

    /// Returns a copy of a stored table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.state().tables.get(name).cloned()
    }

    /// Makes every statement containing `fragment` fail.
    pub fn fail_on(&self, fragment: impl Into<String>) {
        self.state().failures.push(fragment.into());
    }

    /// Statements run so far, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    fn default_engine(&self) -> Option<String> {
        self.engines
            .iter()
            .find(|e| e.is_default)
            .map(|e| e.name.clone())
    }

    /// Mirrors a change into the stored structure.
    pub fn apply(&self, change: &SchemaChange) {
        let default_engine = self.default_engine();
        let mut state = self.state();

        match change {
            SchemaChange::CreateTable {
                table,
                columns,
                indexes,
                engine,
                ..
            } => {
                let mut created = MemoryTable {
                    engine: engine.clone().or(default_engine),
                    ..MemoryTable::default()
                };
                for column in columns {
                    created
                        .columns
                        .insert(column.name.clone(), column_info(column));
                }
                for index in indexes {
                    created.add_index(index);
                }
                state.tables.insert(table.clone(), created);
            }

            SchemaChange::DropTable { table } => {
                state.tables.remove(table);
            }

            SchemaChange::RenameColumn {
                table,
                from,
                column,
            } => {
                if let Some(t) = state.tables.get_mut(table) {
                    if let Some((position, _, _)) = t.columns.shift_remove_full(from) {
                        t.columns
                            .shift_insert(position, column.name.clone(), column_info(column));
                    }
                    for row in &mut t.indexes {
                        if &row.column_name == from {
                            row.column_name.clone_from(&column.name);
                        }
                    }
                    t.refresh_keys();
                }
            }

            SchemaChange::AddColumn {
                table,
                column,
                position,
                inline_primary,
            } => {
                if let Some(t) = state.tables.get_mut(table) {
                    let index = match position {
                        ColumnPosition::First => 0,
                        ColumnPosition::After(prev) => t
                            .columns
                            .get_index_of(prev)
                            .map_or(t.columns.len(), |i| i + 1),
                    };
                    t.columns
                        .shift_insert(index, column.name.clone(), column_info(column));
                    if *inline_primary {
                        let mut primary = IndexSpec::new(IndexSpec::PRIMARY, KeyKind::Primary);
                        primary.columns = vec![column.name.clone()];
                        t.add_index(&primary);
                    }
                    t.refresh_keys();
                }
            }

            SchemaChange::ModifyColumn { table, column } => {
                if let Some(t) = state.tables.get_mut(table) {
                    if let Some(info) = t.columns.get_mut(&column.name) {
                        *info = column_info(column);
                    }
                    t.refresh_keys();
                }
            }

            SchemaChange::DropColumn { table, column_name } => {
                if let Some(t) = state.tables.get_mut(table) {
                    t.columns.shift_remove(column_name);
                    t.indexes.retain(|r| &r.column_name != column_name);
                    t.refresh_keys();
                }
            }

            SchemaChange::AddIndex { table, index } => {
                if let Some(t) = state.tables.get_mut(table) {
                    t.add_index(index);
                }
            }

            SchemaChange::DropIndex { table, name, .. } => {
                if let Some(t) = state.tables.get_mut(table) {
                    t.drop_index(name);
                }
            }

            SchemaChange::ChangeEngine { table, engine } => {
                if let Some(t) = state.tables.get_mut(table) {
                    t.engine = Some(engine.clone());
                }
            }

            SchemaChange::DataMigration { .. } => {}
        }
    }
}

/// Describes a column spec the way the server would report it.
#[must_use]
pub fn column_info(column: &ColumnSpec) -> ColumnInfo {
    let default = match &column.default {
        DefaultValue::None => None,
        DefaultValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        DefaultValue::Integer(i) => Some(i.to_string()),
        DefaultValue::Float(f) => Some(f.to_string()),
        DefaultValue::Text(s) | DefaultValue::Expression(s) => Some(s.clone()),
    };

    ColumnInfo {
        data_type: column.sql_type.clone(),
        length: column.length,
        precision: column.precision,
        nullable: column.nullable,
        default,
        key: ColumnKey::None,
        auto_increment: column.auto_increment,
        unsigned: column.unsigned,
        collation: None,
        enum_options: column.enum_values.clone(),
    }
}

#[async_trait]
impl DatabaseDriver for MemoryDriver {
    async fn list_tables(&self, like: Option<&str>) -> Result<Vec<String>> {
        let state = self.state();
        let mut tables: Vec<String> = state
            .tables
            .keys()
            .filter(|name| like.is_none_or(|pattern| like_matches(pattern, name)))
            .cloned()
            .collect();
        tables.sort();
        Ok(tables)
    }

    async fn list_columns(&self, table: &str) -> Result<IndexMap<String, ColumnInfo>> {
        Ok(self
            .state()
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexRow>> {
        Ok(self
            .state()
            .tables
            .get(table)
            .map(|t| t.indexes.clone())
            .unwrap_or_default())
    }

    async fn table_engine(&self, table: &str) -> Result<Option<String>> {
        Ok(self
            .state()
            .tables
            .get(table)
            .and_then(|t| t.engine.clone()))
    }

    async fn engines(&self) -> Result<Vec<EngineInfo>> {
        Ok(self.engines.clone())
    }

    async fn query(&self, sql: &str) -> Result<()> {
        let mut state = self.state();
        if let Some(fragment) = state.failures.iter().find(|f| sql.contains(f.as_str())) {
            return Err(StructureError::Driver(sqlx::Error::Protocol(format!(
                "statement rejected ({})",
                fragment
            ))));
        }
        state.queries.push(sql.to_string());
        Ok(())
    }

    fn datatype(&self, raw_type: &str) -> Option<TypeInfo> {
        self.dialect.type_info(raw_type)
    }
}

/// Minimal `LIKE` matching: `%` matches any run, `_` any single character.
fn like_matches(pattern: &str, value: &str) -> bool {
    fn matches(p: &[char], v: &[char]) -> bool {
        match p.split_first() {
            None => v.is_empty(),
            Some(('%', rest)) => (0..=v.len()).any(|i| matches(rest, &v[i..])),
            Some(('_', rest)) => !v.is_empty() && matches(rest, &v[1..]),
            Some((c, rest)) => v.first() == Some(c) && matches(rest, &v[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();
    matches(&p, &v)
}
