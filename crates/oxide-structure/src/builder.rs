//! Fluent table-structure builder.
//!
//! A [`Structure`] accumulates the desired definition of one table and
//! converges the live table towards it:
//!
//! ```ignore
//! let mut structure = Structure::new(driver, StructureConfig::default());
//! structure
//!     .table("posts", None)
//!     .primary("id")
//!     .column("title", "varchar(200)", false, &["unique"]);
//! let statements = structure.converge(false, false).await?;
//! ```

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

use crate::config::StructureConfig;
use crate::dialect::{MySqlDialect, StructureDialect};
use crate::diff::{DiffEngine, DiffOptions};
use crate::driver::DatabaseDriver;
use crate::error::Result;
use crate::executor::Executor;
use crate::operations::ChangeSet;
use crate::reader::LiveSchemaReader;
use crate::schema::{
    ColumnSpec, ColumnType, EngineRequest, KeyKind, KeyRole, NullDefault, Table,
};

static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(unsigned\s+)?([a-z]+)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*(unsigned)?\s*$",
    )
    .expect("Invalid column type pattern")
});

/// Declares and converges the structure of one table at a time.
pub struct Structure {
    dialect: Arc<dyn StructureDialect>,
    config: StructureConfig,
    reader: LiveSchemaReader,
    executor: Executor,
    table: Table,
}

impl Structure {
    /// Creates a builder speaking MySQL over the given driver.
    pub fn new(driver: Arc<dyn DatabaseDriver>, config: StructureConfig) -> Self {
        Self::with_dialect(driver, Arc::new(MySqlDialect::new()), config)
    }

    /// Creates a builder with a custom dialect.
    pub fn with_dialect(
        driver: Arc<dyn DatabaseDriver>,
        dialect: Arc<dyn StructureDialect>,
        config: StructureConfig,
    ) -> Self {
        let table = Table {
            prefix: config.prefix.clone(),
            ..Table::default()
        };
        Self {
            reader: LiveSchemaReader::new(driver.clone(), dialect.clone()),
            executor: Executor::new(driver),
            dialect,
            config,
            table,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StructureConfig {
        &self.config
    }

    /// Returns the definition accumulated so far.
    #[must_use]
    pub fn definition(&self) -> &Table {
        &self.table
    }

    /// Sets the target table.
    pub fn table(&mut self, name: &str, encoding: Option<&str>) -> &mut Self {
        if self.table.name != name {
            self.reader.clear();
        }
        self.table.name = name.to_string();
        self.table.encoding = encoding.map(str::to_string);
        self
    }

    /// Sets the table-name prefix.
    pub fn prefix(&mut self, prefix: &str) -> &mut Self {
        if self.table.prefix != prefix {
            self.reader.clear();
        }
        self.table.prefix = prefix.to_string();
        self
    }

    /// Declares a column.
    ///
    /// `keys` holds roles such as `"unique"` or `"index.by_author"`;
    /// unknown roles are ignored.
    pub fn column(
        &mut self,
        name: &str,
        column_type: impl Into<ColumnType>,
        null_default: impl Into<NullDefault>,
        keys: &[&str],
    ) -> &mut Self {
        let mut column = match column_type.into() {
            ColumnType::Named(raw) => parse_type(self.dialect.as_ref(), name, &raw),
            ColumnType::Enum(values) => ColumnSpec::new(name, "enum").values(values),
            ColumnType::Set(values) => ColumnSpec::new(name, "set").values(values),
        };

        let (nullable, default) = null_default.into().into_parts();
        column.nullable = nullable;
        column.default = match self.dialect.type_info(&column.sql_type) {
            Some(info) => default.normalize_for(&info),
            None => default,
        };

        for key in keys {
            match KeyRole::parse(key) {
                Some(role) => column = column.key(role),
                None => debug!(column = %name, key = %key, "Ignoring unknown key role"),
            }
        }
        if column.has_role(KeyKind::Primary) {
            column.nullable = false;
        }

        self.table.columns.insert(name.to_string(), column);
        self
    }

    /// Declares an `int(10)` primary-key column.
    pub fn primary(&mut self, name: &str) -> &mut Self {
        self.primary_typed(name, "int(10)")
    }

    /// Declares a primary-key column of the given type. Integer columns
    /// auto-increment unless another column already does.
    pub fn primary_typed(&mut self, name: &str, column_type: &str) -> &mut Self {
        let mut column = parse_type(self.dialect.as_ref(), name, column_type)
            .not_null()
            .key(KeyRole::new(KeyKind::Primary));

        let is_integer = self
            .dialect
            .type_info(&column.sql_type)
            .is_some_and(|info| info.is_integer());
        let has_auto_increment = self
            .table
            .columns
            .values()
            .any(|c| c.auto_increment && c.name != name);
        if is_integer && !has_auto_increment {
            column = column.auto_increment();
        }

        self.table.columns.insert(name.to_string(), column);
        self
    }

    /// Requests a storage engine. With `check_availability`, an engine the
    /// server lacks is ignored and one is picked automatically.
    pub fn engine(&mut self, name: &str, check_availability: bool) -> &mut Self {
        self.table.engine = Some(EngineRequest {
            name: name.to_string(),
            check_availability,
        });
        self
    }

    /// Renames a live column before the columns are reconciled.
    pub fn rename_column(&mut self, from: &str, to: &str) -> &mut Self {
        self.table.renames.push((from.to_string(), to.to_string()));
        self
    }

    /// Clears the definition. The prefix returns to its configured value;
    /// capture mode and captured statements are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.table = Table {
            prefix: self.config.prefix.clone(),
            ..Table::default()
        };
        self
    }

    /// Switches capture mode: statements are collected instead of run.
    pub fn capture(&mut self, enabled: bool) -> &mut Self {
        self.executor.set_capture(enabled);
        self
    }

    /// Statements captured so far.
    #[must_use]
    pub fn captured(&self) -> &[String] {
        self.executor.captured()
    }

    /// Takes the captured statements.
    pub fn take_captured(&mut self) -> Vec<String> {
        self.executor.take_captured()
    }

    /// Computes the changes without running them. The definition is kept.
    ///
    /// Every plan starts from a fresh read of the target table; reads are
    /// shared within the pass.
    pub async fn plan(&mut self, explicit: bool, drop_table: bool) -> Result<ChangeSet> {
        self.reader.invalidate(&self.table.full_name());
        let options = DiffOptions::new()
            .explicit(explicit)
            .drop_table(drop_table);
        DiffEngine::new(self.dialect.as_ref(), &self.config, options)
            .diff(&self.table, &mut self.reader)
            .await
    }

    /// Converges the live table and returns the statements that were run
    /// (or captured). The definition is reset afterwards, also on failure.
    pub async fn converge(&mut self, explicit: bool, drop_table: bool) -> Result<Vec<String>> {
        let result = self.converge_table(explicit, drop_table).await;
        self.reset();
        result
    }

    async fn converge_table(&mut self, explicit: bool, drop_table: bool) -> Result<Vec<String>> {
        let full_name = self.table.full_name();
        let changes = self.plan(explicit, drop_table).await?;
        if changes.is_empty() {
            debug!(table = %full_name, "Table already converged");
            return Ok(Vec::new());
        }

        for change in changes.iter().filter(|c| c.is_destructive()) {
            info!(table = %full_name, change = %change, "Destructive change");
        }
        let statements: Vec<String> = changes
            .iter()
            .flat_map(|change| self.dialect.generate_sql(change))
            .collect();

        let capturing = self.executor.is_capturing();
        let result = self.executor.run(statements).await;
        if !capturing {
            // Partially applied batches are stale too.
            self.reader.invalidate(&full_name);
        }
        result
    }
}

/// Parses a shorthand type such as `"uint(10)"` or `"decimal(10,2)"`.
/// Unparseable input is kept verbatim and rejected at convergence time.
fn parse_type(dialect: &dyn StructureDialect, name: &str, raw: &str) -> ColumnSpec {
    let Some(caps) = SHORTHAND.captures(raw) else {
        return ColumnSpec::new(name, raw.trim());
    };

    let mut base = caps[2].to_ascii_lowercase();
    let mut unsigned = caps.get(1).is_some() || caps.get(5).is_some();
    if dialect.type_info(&base).is_none() {
        if let Some(stripped) = base.strip_prefix('u') {
            if dialect.type_info(stripped).is_some_and(|t| t.is_numeric()) {
                base = stripped.to_string();
                unsigned = true;
            }
        }
    }

    let mut length = caps.get(3).and_then(|m| m.as_str().parse().ok());
    let precision = caps.get(4).and_then(|m| m.as_str().parse().ok());
    match base.as_str() {
        "bool" | "boolean" => {
            base = "tinyint".to_string();
            length = length.or(Some(1));
        }
        "integer" => base = "int".to_string(),
        _ => {}
    }

    let mut column = ColumnSpec::new(name, base);
    column.length = length;
    column.precision = precision;
    column.unsigned = unsigned;
    column
}
