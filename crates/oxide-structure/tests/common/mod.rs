#![allow(dead_code)]

use std::sync::Arc;

use oxide_structure::driver::{EngineInfo, MemoryDriver, MemoryTable, column_info};
use oxide_structure::prelude::*;

pub fn setup() -> (Arc<MemoryDriver>, Structure) {
    setup_with(MemoryDriver::new())
}

pub fn setup_with(driver: MemoryDriver) -> (Arc<MemoryDriver>, Structure) {
    let driver = Arc::new(driver);
    let structure = Structure::new(driver.clone(), StructureConfig::default());
    (driver, structure)
}

/// A server whose default engine cannot hold full-text indexes.
pub fn no_fulltext_default() -> MemoryDriver {
    MemoryDriver::with_engines(vec![
        EngineInfo::new("InnoDB", false).default_engine(),
        EngineInfo::new("MyISAM", true),
    ])
}

pub fn declare_posts(structure: &mut Structure) {
    structure
        .table("posts", None)
        .primary("id")
        .column("title", "varchar(200)", false, &["unique"]);
}

/// Stores a table built from column specs.
pub fn live_table(driver: &MemoryDriver, name: &str, columns: &[ColumnSpec]) -> MemoryTable {
    let mut table = MemoryTable::new().engine("InnoDB");
    for column in columns {
        table = table.column(column.name.clone(), column_info(column));
    }
    driver.add_table(name, table.clone());
    table
}

pub fn int_column(name: &str) -> ColumnSpec {
    ColumnSpec::new(name, "int").length(10)
}

/// Plans the declared changes and mirrors them into the driver, the way a
/// live run would leave the server. The definition is kept.
pub async fn plan_and_apply(
    driver: &MemoryDriver,
    structure: &mut Structure,
    explicit: bool,
    drop_table: bool,
) -> ChangeSet {
    let changes = structure
        .plan(explicit, drop_table)
        .await
        .unwrap_or_else(|e| panic!("Failed to plan: {e}"));
    for change in &changes {
        driver.apply(change);
    }
    changes
}

/// Converges in capture mode and returns the statements.
pub async fn statements(structure: &mut Structure, explicit: bool, drop_table: bool) -> Vec<String> {
    structure.capture(true);
    let statements = structure
        .converge(explicit, drop_table)
        .await
        .unwrap_or_else(|e| panic!("Failed to converge: {e}"));
    structure.take_captured();
    statements
}
