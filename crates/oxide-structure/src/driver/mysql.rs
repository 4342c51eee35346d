//! MySQL driver over a `sqlx` pool.

use async_trait::async_trait;
use indexmap::IndexMap;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::dialect::{MySqlDialect, StructureDialect};
use crate::error::Result;
use crate::schema::TypeInfo;

use super::{ColumnInfo, ColumnKey, DatabaseDriver, EngineInfo, IndexRow};

/// Engines that always support full-text indexes.
const FULLTEXT_ENGINES: &[&str] = &["MyISAM", "Aria", "Mroonga"];

const LIST_COLUMNS_SQL: &str = r"
SELECT CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR), CAST(COLUMN_TYPE AS CHAR),
       CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR), CAST(COLUMN_KEY AS CHAR),
       CAST(EXTRA AS CHAR), CAST(COLLATION_NAME AS CHAR)
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION
";

const LIST_INDEXES_SQL: &str = r"
SELECT CAST(INDEX_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR), CAST(NON_UNIQUE AS SIGNED),
       CAST(INDEX_TYPE AS CHAR), CAST(SEQ_IN_INDEX AS SIGNED)
FROM information_schema.STATISTICS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY INDEX_NAME = 'PRIMARY' DESC, INDEX_NAME, SEQ_IN_INDEX
";

type ColumnRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
);

/// MySQL (and MariaDB) implementation of [`DatabaseDriver`].
pub struct MySqlDriver {
    pool: MySqlPool,
    dialect: MySqlDialect,
    engines: OnceCell<Vec<EngineInfo>>,
}

impl MySqlDriver {
    /// Creates a driver over an existing pool.
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            dialect: MySqlDialect::new(),
            engines: OnceCell::new(),
        }
    }

    /// Connects to the given database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn probe_engines(&self) -> Result<Vec<EngineInfo>> {
        let (version,): (String,) = sqlx::query_as("SELECT CAST(VERSION() AS CHAR)")
            .fetch_one(&self.pool)
            .await?;
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT CAST(ENGINE AS CHAR), CAST(SUPPORT AS CHAR) FROM information_schema.ENGINES",
        )
        .fetch_all(&self.pool)
        .await?;

        let engines: Vec<EngineInfo> = rows
            .into_iter()
            .filter_map(|(name, support)| {
                let support = support.to_ascii_uppercase();
                if support != "YES" && support != "DEFAULT" {
                    return None;
                }
                let fulltext = FULLTEXT_ENGINES.iter().any(|e| e.eq_ignore_ascii_case(&name))
                    || (name.eq_ignore_ascii_case("InnoDB") && innodb_supports_fulltext(&version));
                let mut engine = EngineInfo::new(name, fulltext);
                engine.is_default = support == "DEFAULT";
                Some(engine)
            })
            .collect();

        debug!(version = %version, count = engines.len(), "Probed storage engines");
        Ok(engines)
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    async fn list_tables(&self, like: Option<&str>) -> Result<Vec<String>> {
        let tables: Vec<(String,)> = match like {
            Some(pattern) => {
                sqlx::query_as(
                    "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME LIKE ? ORDER BY TABLE_NAME",
                )
                .bind(pattern)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
                     WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(tables.into_iter().map(|(name,)| name).collect())
    }

    async fn list_columns(&self, table: &str) -> Result<IndexMap<String, ColumnInfo>> {
        let rows: Vec<ColumnRow> = sqlx::query_as(LIST_COLUMNS_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = IndexMap::new();
        for (name, data_type, column_type, is_nullable, default, key, extra, collation) in rows {
            let parsed = parse_column_type(&column_type);
            columns.insert(
                name,
                ColumnInfo {
                    data_type: data_type.to_ascii_lowercase(),
                    length: parsed.length,
                    precision: parsed.precision,
                    nullable: is_nullable.eq_ignore_ascii_case("YES"),
                    default: default.and_then(unquote_default),
                    key: ColumnKey::parse(&key),
                    auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
                    unsigned: parsed.unsigned,
                    collation,
                    enum_options: parsed.options,
                },
            );
        }
        Ok(columns)
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexRow>> {
        let rows: Vec<(String, String, i64, String, i64)> = sqlx::query_as(LIST_INDEXES_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(key_name, column_name, non_unique, index_type, seq)| IndexRow {
                    key_name,
                    column_name,
                    non_unique: non_unique != 0,
                    index_type,
                    seq_in_index: u32::try_from(seq).unwrap_or(0),
                },
            )
            .collect())
    }

    async fn table_engine(&self, table: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT CAST(ENGINE AS CHAR) FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|(engine,)| engine))
    }

    async fn engines(&self) -> Result<Vec<EngineInfo>> {
        self.engines
            .get_or_try_init(|| self.probe_engines())
            .await
            .cloned()
    }

    async fn query(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    fn datatype(&self, raw_type: &str) -> Option<TypeInfo> {
        self.dialect.type_info(raw_type)
    }
}

/// Pieces of a `COLUMN_TYPE` value such as `int(10) unsigned`.
#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedColumnType {
    length: Option<u32>,
    precision: Option<u32>,
    unsigned: bool,
    options: Vec<String>,
}

fn parse_column_type(column_type: &str) -> ParsedColumnType {
    let mut parsed = ParsedColumnType {
        unsigned: column_type.to_ascii_lowercase().contains(" unsigned"),
        ..ParsedColumnType::default()
    };

    let (Some(open), Some(close)) = (column_type.find('('), column_type.rfind(')')) else {
        return parsed;
    };
    if close <= open {
        return parsed;
    }
    let inner = &column_type[open + 1..close];

    if inner.starts_with('\'') {
        parsed.options = parse_quoted_list(inner);
        return parsed;
    }

    let mut numbers = inner.split(',').map(|n| n.trim().parse::<u32>().ok());
    parsed.length = numbers.next().flatten();
    parsed.precision = numbers.next().flatten();
    parsed
}

/// Splits `'a','b''c'` into `["a", "b'c"]`.
fn parse_quoted_list(inner: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                current.push('\'');
                chars.next();
            }
            '\'' if in_quote => {
                in_quote = false;
                values.push(std::mem::take(&mut current));
            }
            '\'' => in_quote = true,
            _ if in_quote => current.push(c),
            _ => {}
        }
    }
    values
}

/// MariaDB reports string defaults quoted and NULL defaults as `NULL`.
fn unquote_default(default: String) -> Option<String> {
    if default.eq_ignore_ascii_case("NULL") {
        return None;
    }
    if default.len() >= 2 && default.starts_with('\'') && default.ends_with('\'') {
        return Some(default[1..default.len() - 1].replace("''", "'"));
    }
    Some(default)
}

/// InnoDB gained full-text indexes in MySQL 5.6 and MariaDB 10.0.
fn innodb_supports_fulltext(version: &str) -> bool {
    let mut parts = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);

    if version.to_ascii_lowercase().contains("mariadb") {
        major >= 10
    } else {
        (major, minor) >= (5, 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_type_numeric() {
        assert_eq!(
            parse_column_type("int(10) unsigned"),
            ParsedColumnType {
                length: Some(10),
                precision: None,
                unsigned: true,
                options: vec![],
            }
        );
        assert_eq!(
            parse_column_type("decimal(10,2)"),
            ParsedColumnType {
                length: Some(10),
                precision: Some(2),
                unsigned: false,
                options: vec![],
            }
        );
        assert_eq!(parse_column_type("text"), ParsedColumnType::default());
    }

    #[test]
    fn test_parse_column_type_enum() {
        let parsed = parse_column_type("enum('draft','it''s live','a,b')");
        assert_eq!(parsed.options, vec!["draft", "it's live", "a,b"]);
        assert_eq!(parsed.length, None);
    }

    #[test]
    fn test_unquote_default() {
        assert_eq!(unquote_default("NULL".into()), None);
        assert_eq!(unquote_default("'ab''c'".into()), Some("ab'c".into()));
        assert_eq!(unquote_default("0".into()), Some("0".into()));
        assert_eq!(
            unquote_default("CURRENT_TIMESTAMP".into()),
            Some("CURRENT_TIMESTAMP".into())
        );
    }

    #[test]
    fn test_innodb_fulltext_versions() {
        assert!(innodb_supports_fulltext("8.0.36"));
        assert!(innodb_supports_fulltext("5.7.44-log"));
        assert!(!innodb_supports_fulltext("5.5.62"));
        assert!(innodb_supports_fulltext("10.6.16-MariaDB"));
    }
}
