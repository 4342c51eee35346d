//! Live schema introspection.
//!
//! [`LiveSchemaReader`] translates what the driver reports into the same
//! [`ColumnSpec`]/[`IndexSpec`] shapes the builder produces, and memoizes
//! the results per table name until they are invalidated.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::dialect::StructureDialect;
use crate::driver::{ColumnInfo, ColumnKey, DatabaseDriver, EngineInfo, IndexRow};
use crate::error::Result;
use crate::schema::{
    ColumnSpec, DefaultValue, IndexSpec, KeyKind, KeyRole, TypeClass, is_expression, parse_number,
};

/// Reads and caches the live structure of tables.
pub struct LiveSchemaReader {
    driver: Arc<dyn DatabaseDriver>,
    dialect: Arc<dyn StructureDialect>,
    exists: HashMap<String, bool>,
    columns: HashMap<String, IndexMap<String, ColumnSpec>>,
    indexes: HashMap<String, IndexMap<String, IndexSpec>>,
    engines: HashMap<String, Option<String>>,
}

impl LiveSchemaReader {
    /// Creates a reader over a driver.
    pub fn new(driver: Arc<dyn DatabaseDriver>, dialect: Arc<dyn StructureDialect>) -> Self {
        Self {
            driver,
            dialect,
            exists: HashMap::new(),
            columns: HashMap::new(),
            indexes: HashMap::new(),
            engines: HashMap::new(),
        }
    }

    /// Returns the driver.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn DatabaseDriver> {
        &self.driver
    }

    /// Forgets everything cached for a table.
    pub fn invalidate(&mut self, table: &str) {
        self.exists.remove(table);
        self.columns.remove(table);
        self.indexes.remove(table);
        self.engines.remove(table);
    }

    /// Forgets everything cached.
    pub fn clear(&mut self) {
        self.exists.clear();
        self.columns.clear();
        self.indexes.clear();
        self.engines.clear();
    }

    /// Returns whether the table exists.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        if let Some(exists) = self.exists.get(table) {
            return Ok(*exists);
        }
        // LIKE treats `_` as a wildcard, so compare names exactly.
        let exists = self
            .driver
            .list_tables(Some(table))
            .await?
            .iter()
            .any(|t| t == table);
        debug!(table = %table, exists, "Checked table existence");
        self.exists.insert(table.to_string(), exists);
        Ok(exists)
    }

    /// Returns the live columns of a table, in table order.
    pub async fn existing_columns(&mut self, table: &str) -> Result<IndexMap<String, ColumnSpec>> {
        if let Some(columns) = self.columns.get(table) {
            return Ok(columns.clone());
        }
        let columns: IndexMap<String, ColumnSpec> = if self.table_exists(table).await? {
            self.driver
                .list_columns(table)
                .await?
                .into_iter()
                .map(|(name, info)| {
                    let spec = self.column_spec(&name, info);
                    (name, spec)
                })
                .collect()
        } else {
            IndexMap::new()
        };
        debug!(table = %table, count = columns.len(), "Read live columns");
        self.columns.insert(table.to_string(), columns.clone());
        Ok(columns)
    }

    /// Returns the live indexes of a table, keyed by index name.
    pub async fn existing_index_specs(
        &mut self,
        table: &str,
    ) -> Result<IndexMap<String, IndexSpec>> {
        if let Some(indexes) = self.indexes.get(table) {
            return Ok(indexes.clone());
        }
        let indexes = if self.table_exists(table).await? {
            group_index_rows(self.driver.list_indexes(table).await?)
        } else {
            IndexMap::new()
        };
        debug!(table = %table, count = indexes.len(), "Read live indexes");
        self.indexes.insert(table.to_string(), indexes.clone());
        Ok(indexes)
    }

    /// Returns the live indexes of a table rendered as SQL fragments.
    pub async fn existing_indexes(&mut self, table: &str) -> Result<IndexMap<String, String>> {
        let specs = self.existing_index_specs(table).await?;
        Ok(specs
            .iter()
            .map(|(name, index)| (name.clone(), self.dialect.index_fragment(index)))
            .collect())
    }

    /// Returns the storage engine of a table.
    pub async fn table_engine(&mut self, table: &str) -> Result<Option<String>> {
        if let Some(engine) = self.engines.get(table) {
            return Ok(engine.clone());
        }
        let engine = if self.table_exists(table).await? {
            self.driver.table_engine(table).await?
        } else {
            None
        };
        self.engines.insert(table.to_string(), engine.clone());
        Ok(engine)
    }

    /// Returns the storage engines the server supports.
    pub async fn engines(&self) -> Result<Vec<EngineInfo>> {
        self.driver.engines().await
    }

    /// Translates a driver column into a column spec.
    fn column_spec(&self, name: &str, info: ColumnInfo) -> ColumnSpec {
        let class = self.driver.datatype(&info.data_type).map(|t| t.class);

        let default = match info.default {
            None => DefaultValue::None,
            Some(text) => match class {
                Some(TypeClass::Int | TypeClass::Float | TypeClass::Bool) => {
                    parse_number(&text).unwrap_or(DefaultValue::Text(text))
                }
                Some(TypeClass::Date) if is_expression(&text) => DefaultValue::Expression(text),
                _ => DefaultValue::Text(text),
            },
        };

        let mut spec = ColumnSpec::new(name, info.data_type);
        spec.length = info.length;
        spec.precision = info.precision;
        spec.enum_values = info.enum_options;
        spec.nullable = info.nullable;
        spec.default = default;
        spec.unsigned = info.unsigned;
        spec.auto_increment = info.auto_increment;
        spec.key_roles = match info.key {
            ColumnKey::Primary => vec![KeyRole::new(KeyKind::Primary)],
            ColumnKey::Unique => vec![KeyRole::new(KeyKind::Unique)],
            ColumnKey::Multiple => vec![KeyRole::new(KeyKind::Index)],
            ColumnKey::None => Vec::new(),
        };
        spec
    }
}

/// Groups index rows by index name, ordering columns by their position.
fn group_index_rows(rows: Vec<IndexRow>) -> IndexMap<String, IndexSpec> {
    let mut grouped: IndexMap<String, Vec<IndexRow>> = IndexMap::new();
    for row in rows {
        grouped.entry(row.key_name.clone()).or_default().push(row);
    }

    grouped
        .into_iter()
        .map(|(name, mut rows)| {
            rows.sort_by_key(|r| r.seq_in_index);
            let first = &rows[0];
            let kind = if name == IndexSpec::PRIMARY {
                KeyKind::Primary
            } else if first.index_type.eq_ignore_ascii_case("FULLTEXT") {
                KeyKind::Fulltext
            } else if !first.non_unique {
                KeyKind::Unique
            } else {
                KeyKind::Index
            };
            let mut index = IndexSpec::new(name.clone(), kind);
            index.columns = rows.into_iter().map(|r| r.column_name).collect();
            (name, index)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, column: &str, non_unique: bool, kind: &str, seq: u32) -> IndexRow {
        IndexRow {
            key_name: key.to_string(),
            column_name: column.to_string(),
            non_unique,
            index_type: kind.to_string(),
            seq_in_index: seq,
        }
    }

    #[test]
    fn test_group_index_rows() {
        let grouped = group_index_rows(vec![
            row("PRIMARY", "id", false, "BTREE", 1),
            row("IX_posts_author", "created", true, "BTREE", 2),
            row("IX_posts_author", "author_id", true, "BTREE", 1),
            row("UX_posts", "title", false, "BTREE", 1),
            row("FT_posts", "body", true, "FULLTEXT", 1),
        ]);

        assert_eq!(grouped.len(), 4);
        assert_eq!(grouped["PRIMARY"].kind, KeyKind::Primary);
        assert_eq!(
            grouped["IX_posts_author"].columns,
            vec!["author_id", "created"]
        );
        assert_eq!(grouped["IX_posts_author"].kind, KeyKind::Index);
        assert_eq!(grouped["UX_posts"].kind, KeyKind::Unique);
        assert_eq!(grouped["FT_posts"].kind, KeyKind::Fulltext);
    }
}
