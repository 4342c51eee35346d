//! Diff engine for converging a live table towards its declared structure.
//!
//! [`DiffEngine`] compares a [`Table`] definition with what the
//! [`LiveSchemaReader`] reports and returns the ordered [`ChangeSet`] that
//! brings the live table in line. Column changes come first, then engine
//! changes, then index changes, and data migrations last.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::StructureConfig;
use crate::dialect::StructureDialect;
use crate::driver::EngineInfo;
use crate::error::{Result, StructureError};
use crate::operations::{ChangeSet, ColumnPosition, SchemaChange};
use crate::reader::LiveSchemaReader;
use crate::schema::{ColumnSpec, DefaultValue, IndexSpec, KeyKind, Table, TypeClass, parse_number};

/// Options for a diff run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Drop live columns and indexes the definition does not mention.
    pub explicit: bool,
    /// Drop and recreate the table instead of altering it.
    pub drop_table: bool,
}

impl DiffOptions {
    /// Creates additive options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the definition complete: undeclared columns and indexes are
    /// dropped.
    #[must_use]
    pub fn explicit(mut self, explicit: bool) -> Self {
        self.explicit = explicit;
        self
    }

    /// Recreates the table from scratch.
    #[must_use]
    pub fn drop_table(mut self, drop_table: bool) -> Self {
        self.drop_table = drop_table;
        self
    }
}

/// Computes the changes that converge one table.
pub struct DiffEngine<'a> {
    dialect: &'a dyn StructureDialect,
    config: &'a StructureConfig,
    options: DiffOptions,
}

impl<'a> DiffEngine<'a> {
    /// Creates a diff engine.
    pub fn new(
        dialect: &'a dyn StructureDialect,
        config: &'a StructureConfig,
        options: DiffOptions,
    ) -> Self {
        Self {
            dialect,
            config,
            options,
        }
    }

    /// Checks that the definition can be rendered at all.
    pub fn validate(&self, table: &Table) -> Result<()> {
        if table.name.is_empty() {
            return Err(StructureError::MissingDefinition(
                "no table name was given".to_string(),
            ));
        }
        if table.columns.is_empty() {
            return Err(StructureError::MissingDefinition(format!(
                "table '{}' declares no columns",
                table.full_name()
            )));
        }
        for column in table.columns.values() {
            if self.dialect.type_info(&column.sql_type).is_none() {
                return Err(StructureError::UnsupportedType {
                    table: table.full_name(),
                    column: column.name.clone(),
                    sql_type: column.sql_type.clone(),
                });
            }
        }
        Ok(())
    }

    /// Compares the definition with the live table.
    pub async fn diff(&self, table: &Table, reader: &mut LiveSchemaReader) -> Result<ChangeSet> {
        self.validate(table)?;

        let full_name = table.full_name();
        let engines = reader.engines().await?;
        let requested = self.requested_engine(table, &engines);

        let mut changes = ChangeSet::new();
        let mut exists = reader.table_exists(&full_name).await?;
        if exists && self.options.drop_table {
            changes.push(SchemaChange::DropTable {
                table: full_name.clone(),
            });
            exists = false;
        }

        if exists {
            self.diff_table(table, &full_name, requested, &engines, reader, &mut changes)
                .await?;
        } else {
            changes.push(self.create_table(table, &full_name, requested, &engines));
        }

        info!(table = %full_name, changes = changes.len(), "Computed table changes");
        Ok(changes)
    }

    /// Resolves the explicitly requested engine, if it may be used.
    fn requested_engine(&self, table: &Table, engines: &[EngineInfo]) -> Option<String> {
        let request = table.engine.as_ref()?;
        match find_engine(engines, &request.name) {
            Some(engine) => Some(engine.name.clone()),
            None if !request.check_availability || engines.is_empty() => {
                Some(request.name.clone())
            }
            None => {
                let err = StructureError::EngineUnavailable(request.name.clone());
                warn!(table = %table.full_name(), error = %err, "Ignoring engine request");
                None
            }
        }
    }

    /// Picks the engine for a new table.
    fn create_engine(
        &self,
        table: &Table,
        requested: Option<String>,
        engines: &[EngineInfo],
    ) -> String {
        if let Some(engine) = requested {
            return engine;
        }

        if table.requests(KeyKind::Fulltext) {
            let default_fulltext = find_engine(engines, &self.config.default_engine)
                .filter(|e| e.supports_fulltext);
            let candidate = default_fulltext
                .or_else(|| {
                    find_engine(engines, &self.config.fallback_engine)
                        .filter(|e| e.supports_fulltext)
                })
                .or_else(|| engines.iter().find(|e| e.supports_fulltext));
            if let Some(engine) = candidate {
                return engine.name.clone();
            }
        }

        if engines.is_empty() {
            return self.config.default_engine.clone();
        }
        match find_engine(engines, &self.config.default_engine) {
            Some(engine) => engine.name.clone(),
            None => {
                warn!(
                    engine = %self.config.default_engine,
                    fallback = %self.config.fallback_engine,
                    "Default engine unavailable, using fallback"
                );
                self.config.fallback_engine.clone()
            }
        }
    }

    fn create_table(
        &self,
        table: &Table,
        full_name: &str,
        requested: Option<String>,
        engines: &[EngineInfo],
    ) -> SchemaChange {
        let engine = self.create_engine(table, requested, engines);
        let fulltext = supports_fulltext(engines, &engine);
        let indexes = desired_indexes(table, full_name, fulltext);

        debug!(table = %full_name, engine = %engine, "Creating table");
        SchemaChange::CreateTable {
            table: full_name.to_string(),
            columns: table.columns.values().cloned().collect(),
            indexes: indexes.into_values().collect(),
            engine: Some(engine),
            encoding: table
                .encoding
                .clone()
                .or_else(|| Some(self.config.default_encoding.clone()))
                .filter(|e| !e.is_empty()),
        }
    }

    /// Alters an existing table.
    async fn diff_table(
        &self,
        table: &Table,
        full_name: &str,
        requested: Option<String>,
        engines: &[EngineInfo],
        reader: &mut LiveSchemaReader,
        changes: &mut ChangeSet,
    ) -> Result<()> {
        let mut live_columns = reader.existing_columns(full_name).await?;
        let mut live_indexes = reader.existing_index_specs(full_name).await?;

        for (from, to) in &table.renames {
            if let Some(change) =
                self.rename(full_name, from, to, &mut live_columns, &mut live_indexes)?
            {
                changes.push(change);
            }
        }

        let mut migrations = Vec::new();
        let has_primary = live_indexes.contains_key(IndexSpec::PRIMARY);
        let primary_columns = table
            .columns
            .values()
            .filter(|c| c.has_role(KeyKind::Primary))
            .count();
        let mut primary_inlined = false;
        let mut previous: Option<&str> = None;

        for (name, desired) in &table.columns {
            match live_columns.get(name) {
                None => {
                    let inline_primary =
                        !has_primary && primary_columns == 1 && desired.is_plain_auto_primary();
                    primary_inlined |= inline_primary;
                    changes.push(SchemaChange::AddColumn {
                        table: full_name.to_string(),
                        column: desired.clone(),
                        position: match previous {
                            Some(prev) => ColumnPosition::After(prev.to_string()),
                            None => ColumnPosition::First,
                        },
                        inline_primary,
                    });
                }
                Some(live) => {
                    if !self.same_definition(live, desired) {
                        debug!(table = %full_name, column = %name, "Column definition differs");
                        changes.push(SchemaChange::ModifyColumn {
                            table: full_name.to_string(),
                            column: desired.clone(),
                        });
                        if let Some(migration) = self.enum_migration(full_name, live, desired) {
                            migrations.push(migration);
                        }
                    }
                }
            }
            previous = Some(name);
        }

        let mut dropped_columns = HashSet::new();
        if self.options.explicit {
            for name in live_columns.keys() {
                if !table.columns.contains_key(name) {
                    changes.push(SchemaChange::DropColumn {
                        table: full_name.to_string(),
                        column_name: name.clone(),
                    });
                    dropped_columns.insert(name.clone());
                }
            }
        }

        let live_engine = reader.table_engine(full_name).await?;
        let engine_changes = match (&requested, &live_engine) {
            (Some(desired), Some(live)) => !desired.eq_ignore_ascii_case(live),
            (Some(_), None) => true,
            _ => false,
        };
        if let (true, Some(desired)) = (engine_changes, &requested) {
            if !supports_fulltext(engines, desired) {
                let fulltext: Vec<String> = live_indexes
                    .values()
                    .filter(|i| i.kind == KeyKind::Fulltext)
                    .map(|i| i.name.clone())
                    .collect();
                for name in fulltext {
                    warn!(
                        table = %full_name,
                        index = %name,
                        engine = %desired,
                        "Dropping full-text index the new engine cannot hold"
                    );
                    live_indexes.shift_remove(&name);
                    changes.push(SchemaChange::DropIndex {
                        table: full_name.to_string(),
                        name,
                        primary: false,
                    });
                }
            }
            changes.push(SchemaChange::ChangeEngine {
                table: full_name.to_string(),
                engine: desired.clone(),
            });
        }

        let effective_engine = requested.or(live_engine);
        let fulltext = effective_engine
            .as_deref()
            .is_none_or(|engine| supports_fulltext(engines, engine));
        let mut desired_indexes = desired_indexes(table, full_name, fulltext);
        if primary_inlined {
            desired_indexes.shift_remove(IndexSpec::PRIMARY);
        }

        for (name, desired) in &desired_indexes {
            match live_indexes.get(name) {
                Some(live)
                    if self.dialect.index_fragment(live) == self.dialect.index_fragment(desired) => {}
                Some(live) => {
                    changes.push(drop_index(full_name, live));
                    changes.push(SchemaChange::AddIndex {
                        table: full_name.to_string(),
                        index: desired.clone(),
                    });
                }
                None => changes.push(SchemaChange::AddIndex {
                    table: full_name.to_string(),
                    index: desired.clone(),
                }),
            }
        }

        if self.options.explicit {
            for (name, live) in &live_indexes {
                if desired_indexes.contains_key(name)
                    || (primary_inlined && name == IndexSpec::PRIMARY)
                {
                    continue;
                }
                // Dropping every column of an index removes the index with it.
                if live.columns.iter().all(|c| dropped_columns.contains(c)) {
                    continue;
                }
                changes.push(drop_index(full_name, live));
            }
        }

        changes.extend(migrations);
        Ok(())
    }

    /// Handles one pending rename against the live columns.
    fn rename(
        &self,
        full_name: &str,
        from: &str,
        to: &str,
        live_columns: &mut IndexMap<String, ColumnSpec>,
        live_indexes: &mut IndexMap<String, IndexSpec>,
    ) -> Result<Option<SchemaChange>> {
        let ambiguous = || StructureError::AmbiguousRename {
            table: full_name.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        };

        if from == to {
            return Ok(None);
        }

        let Some(position) = live_columns.get_index_of(from) else {
            if live_columns.contains_key(to) {
                debug!(table = %full_name, column = %to, "Column already renamed");
                return Ok(None);
            }
            return Err(ambiguous());
        };
        if live_columns.contains_key(to) {
            return Err(ambiguous());
        }

        let Some((_, mut column)) = live_columns.shift_remove_index(position) else {
            return Err(ambiguous());
        };
        // Rename only; any remaining definition change follows as MODIFY.
        column.name = to.to_string();
        live_columns.shift_insert(position, to.to_string(), column.clone());

        for index in live_indexes.values_mut() {
            for c in &mut index.columns {
                if c == from {
                    *c = to.to_string();
                }
            }
        }

        info!(table = %full_name, from = %from, to = %to, "Renaming column");
        Ok(Some(SchemaChange::RenameColumn {
            table: full_name.to_string(),
            from: from.to_string(),
            column,
        }))
    }

    /// Compares the rendered definitions of a live and a desired column.
    fn same_definition(&self, live: &ColumnSpec, desired: &ColumnSpec) -> bool {
        let mut live = live.clone();
        let mut desired = desired.clone();
        if live.sql_type == desired.sql_type {
            match self.dialect.type_info(&live.sql_type).map(|t| t.class) {
                // Display widths are reported by some servers and dropped by
                // others; an undeclared width matches whatever is live.
                Some(TypeClass::Int) if live.length.is_none() || desired.length.is_none() => {
                    live.length = None;
                    desired.length = None;
                }
                // Bare `decimal` is stored as `decimal(10,0)`.
                Some(TypeClass::Float)
                    if desired.sql_type == "decimal"
                        && desired.length.is_none()
                        && desired.precision.is_none() =>
                {
                    desired.length = Some(10);
                    desired.precision = Some(0);
                }
                _ => {}
            }
        }
        // MariaDB reports `current_timestamp()` for `CURRENT_TIMESTAMP`.
        for column in [&mut live, &mut desired] {
            if let DefaultValue::Expression(expr) = &column.default {
                let expr = expr.trim().to_ascii_uppercase();
                let expr = expr.strip_suffix("()").unwrap_or(&expr).to_string();
                column.default = DefaultValue::Expression(expr);
            }
        }
        self.dialect.column_definition(&live, false)
            == self.dialect.column_definition(&desired, false)
    }

    /// Remaps enum positions to the numeric values the options spelled out,
    /// after an enum column is converted to an integer type.
    fn enum_migration(
        &self,
        table: &str,
        live: &ColumnSpec,
        desired: &ColumnSpec,
    ) -> Option<SchemaChange> {
        // `set` columns hold bitmasks, not positions.
        if live.sql_type != "enum" {
            return None;
        }
        let desired_class = self.dialect.type_info(&desired.sql_type)?.class;
        if desired_class != TypeClass::Int {
            return None;
        }

        let column = self.dialect.quote_identifier(&desired.name);
        let arms: Vec<String> = live
            .enum_values
            .iter()
            .enumerate()
            .filter_map(|(i, value)| match parse_number(value)? {
                number @ (DefaultValue::Integer(_) | DefaultValue::Float(_)) => {
                    Some(format!("WHEN {} THEN {}", i + 1, number.to_sql()?))
                }
                _ => None,
            })
            .collect();
        if arms.is_empty() {
            return None;
        }

        Some(SchemaChange::DataMigration {
            description: format!("remap enum positions of {}.{}", table, desired.name),
            sql: format!(
                "UPDATE {} SET {} = CASE {} {} ELSE {} END",
                self.dialect.quote_identifier(table),
                column,
                column,
                arms.join(" "),
                column
            ),
        })
    }
}

fn find_engine<'e>(engines: &'e [EngineInfo], name: &str) -> Option<&'e EngineInfo> {
    engines.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

fn supports_fulltext(engines: &[EngineInfo], engine: &str) -> bool {
    match find_engine(engines, engine) {
        Some(info) => info.supports_fulltext,
        None => engines.is_empty(),
    }
}

fn drop_index(table: &str, index: &IndexSpec) -> SchemaChange {
    SchemaChange::DropIndex {
        table: table.to_string(),
        name: index.name.clone(),
        primary: index.kind == KeyKind::Primary,
    }
}

/// Builds the declared indexes, primary key first, in declaration order.
fn desired_indexes(table: &Table, full_name: &str, fulltext: bool) -> IndexMap<String, IndexSpec> {
    let mut indexes: IndexMap<String, IndexSpec> = IndexMap::new();
    let mut skipped: Vec<String> = Vec::new();

    for column in table.columns.values() {
        for role in &column.key_roles {
            let name = IndexSpec::name_for(full_name, role, &column.name);
            if role.kind == KeyKind::Fulltext && !fulltext {
                if !skipped.contains(&name) {
                    warn!(
                        table = %full_name,
                        index = %name,
                        "Engine lacks full-text support, skipping index"
                    );
                    skipped.push(name);
                }
                continue;
            }
            let index = indexes
                .entry(name.clone())
                .or_insert_with(|| IndexSpec::new(name, role.kind));
            if !index.columns.contains(&column.name) {
                index.columns.push(column.name.clone());
            }
        }
    }

    match indexes.shift_remove(IndexSpec::PRIMARY) {
        Some(primary) => {
            let mut ordered = IndexMap::with_capacity(indexes.len() + 1);
            ordered.insert(primary.name.clone(), primary);
            ordered.extend(indexes);
            ordered
        }
        None => indexes,
    }
}
