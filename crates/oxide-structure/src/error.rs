//! Error types for structure convergence.

use std::path::PathBuf;

/// Errors that can occur while converging a table structure.
#[derive(Debug, thiserror::Error)]
pub enum StructureError {
    /// A desired column uses a type the dialect does not know.
    #[error("Unsupported type '{sql_type}' for column '{table}.{column}'")]
    UnsupportedType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// The rejected type name.
        sql_type: String,
    },

    /// `converge()` was called without a table name or without columns.
    #[error("Missing table definition: {0}")]
    MissingDefinition(String),

    /// A statement was rejected by the database.
    #[error("Statement failed: {statement}: {source}")]
    StatementFailed {
        /// The statement text.
        statement: String,
        /// The underlying driver error.
        #[source]
        source: Box<StructureError>,
    },

    /// A rename where both or neither of the names exist.
    #[error("Ambiguous rename of '{table}.{from}' to '{to}'")]
    AmbiguousRename {
        /// Table name.
        table: String,
        /// Current column name.
        from: String,
        /// Requested column name.
        to: String,
    },

    /// A storage engine is not available on the server.
    ///
    /// Only used internally to trigger a fallback; never returned from
    /// `converge()`.
    #[error("Storage engine '{0}' is not available")]
    EngineUnavailable(String),

    /// No connection was registered under the given name.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// Database error.
    #[error("Database error: {0}")]
    Driver(#[from] sqlx::Error),

    /// Invalid configuration or table definition.
    #[error("Configuration error in '{path}': {message}")]
    Config {
        /// File the configuration came from.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// IO error (reading configuration or definition files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StructureError {
    /// Wraps a driver error with the statement that caused it.
    #[must_use]
    pub fn statement_failed(statement: impl Into<String>, source: Self) -> Self {
        Self::StatementFailed {
            statement: statement.into(),
            source: Box::new(source),
        }
    }
}

/// Result type for structure operations.
pub type Result<T> = std::result::Result<T, StructureError>;
