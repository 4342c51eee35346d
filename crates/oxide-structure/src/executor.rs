//! Statement executor.
//!
//! Runs rendered statements against the driver, or in capture mode
//! collects them for review without touching the database.

use std::sync::Arc;

use tracing::{debug, info};

use crate::driver::DatabaseDriver;
use crate::error::{Result, StructureError};

/// Executes or captures statements.
pub struct Executor {
    driver: Arc<dyn DatabaseDriver>,
    capture: bool,
    captured: Vec<String>,
}

impl Executor {
    /// Creates an executor in live mode.
    pub fn new(driver: Arc<dyn DatabaseDriver>) -> Self {
        Self {
            driver,
            capture: false,
            captured: Vec::new(),
        }
    }

    /// Enables or disables capture mode.
    pub fn set_capture(&mut self, enabled: bool) {
        self.capture = enabled;
    }

    /// Returns whether capture mode is on.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capture
    }

    /// Statements captured so far, in emission order.
    #[must_use]
    pub fn captured(&self) -> &[String] {
        &self.captured
    }

    /// Takes the captured statements, leaving the log empty.
    pub fn take_captured(&mut self) -> Vec<String> {
        std::mem::take(&mut self.captured)
    }

    /// Runs a batch of statements in order.
    ///
    /// In capture mode the statements are appended to the log and returned
    /// unchanged. In live mode the first failure aborts the rest of the
    /// batch; statements that already ran stay applied.
    pub async fn run(&mut self, statements: Vec<String>) -> Result<Vec<String>> {
        if statements.is_empty() {
            return Ok(statements);
        }

        if self.capture {
            debug!(count = statements.len(), "Capturing statements");
            self.captured.extend(statements.iter().cloned());
            return Ok(statements);
        }

        info!(count = statements.len(), "Executing statements");
        for sql in &statements {
            debug!(sql = %sql, "Executing SQL");
            self.driver
                .query(sql)
                .await
                .map_err(|e| StructureError::statement_failed(sql.as_str(), e))?;
        }
        Ok(statements)
    }
}
