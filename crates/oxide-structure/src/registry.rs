//! Named connections.
//!
//! A [`StructureRegistry`] maps connection names to a driver and its
//! configuration, and hands out fresh [`Structure`] builders over them.
//! Builders for the same name share one driver, and with it the driver's
//! engine capability cache.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::builder::Structure;
use crate::config::StructureConfig;
use crate::driver::DatabaseDriver;
use crate::error::{Result, StructureError};

/// Name used when a connection is registered without one.
pub const DEFAULT_CONNECTION: &str = "default";

struct Connection {
    driver: Arc<dyn DatabaseDriver>,
    config: StructureConfig,
}

/// Registry of named connections.
#[derive(Default)]
pub struct StructureRegistry {
    connections: HashMap<String, Connection>,
}

impl StructureRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection, replacing any previous one of that name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        driver: Arc<dyn DatabaseDriver>,
        config: StructureConfig,
    ) -> &mut Self {
        let name = name.into();
        debug!(connection = %name, "Registering connection");
        self.connections.insert(name, Connection { driver, config });
        self
    }

    /// Returns true if a connection of that name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Returns the driver of a connection.
    pub fn driver(&self, name: &str) -> Result<Arc<dyn DatabaseDriver>> {
        self.connection(name).map(|c| c.driver.clone())
    }

    /// Creates a builder over a connection.
    pub fn structure(&self, name: &str) -> Result<Structure> {
        let connection = self.connection(name)?;
        Ok(Structure::new(
            connection.driver.clone(),
            connection.config.clone(),
        ))
    }

    fn connection(&self, name: &str) -> Result<&Connection> {
        self.connections
            .get(name)
            .ok_or_else(|| StructureError::UnknownConnection(name.to_string()))
    }
}
