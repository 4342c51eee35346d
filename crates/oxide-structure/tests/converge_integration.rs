//! Integration tests for table convergence.
//!
//! Tables live in a `MemoryDriver`; statements are captured, and planned
//! changes are mirrored into the driver to check that a second pass finds
//! nothing left to do.

mod common;

use common::{
    declare_posts, int_column, live_table, no_fulltext_default, plan_and_apply, setup,
    setup_with, statements,
};
use oxide_structure::driver::{EngineInfo, MemoryDriver, MemoryTable};
use oxide_structure::prelude::*;

// =============================================================================
// Creating tables
// =============================================================================

#[tokio::test]
async fn posts_table_is_created_once() {
    let (driver, mut structure) = setup();

    declare_posts(&mut structure);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(
        sql,
        vec![
            "CREATE TABLE `posts` (\n  \
             `id` int(10) NOT NULL AUTO_INCREMENT PRIMARY KEY,\n  \
             `title` varchar(200) NOT NULL,\n  \
             UNIQUE INDEX `UX_posts` (`title`)\n\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
        ]
    );

    declare_posts(&mut structure);
    plan_and_apply(&driver, &mut structure, false, false).await;

    // Second run against the created table: nothing to do.
    structure.capture(false);
    let sql = structure.converge(false, false).await.unwrap();
    assert!(sql.is_empty(), "unexpected statements: {sql:?}");
    assert!(driver.queries().is_empty());
}

#[tokio::test]
async fn composite_keys_use_separate_clauses() {
    let (_, mut structure) = setup();
    structure
        .table("tags", Some("latin1"))
        .primary_typed("post_id", "uint(10)")
        .primary("tag_id")
        .column("label", "varchar(40)", "", &["index.lookup"])
        .column("lang", "char(2)", "en", &["index.lookup"])
        .column("note", "text", true, &["fulltext"]);

    let sql = statements(&mut structure, false, false).await;
    assert_eq!(sql.len(), 1);
    assert_eq!(
        sql[0],
        "CREATE TABLE `tags` (\n  \
         `post_id` int(10) unsigned NOT NULL AUTO_INCREMENT,\n  \
         `tag_id` int(10) NOT NULL,\n  \
         `label` varchar(40) NOT NULL DEFAULT '',\n  \
         `lang` char(2) NOT NULL DEFAULT 'en',\n  \
         `note` text,\n  \
         PRIMARY KEY (`post_id`, `tag_id`),\n  \
         INDEX `IX_tags_lookup` (`label`, `lang`),\n  \
         FULLTEXT INDEX `FT_tags` (`note`)\n\
         ) ENGINE=InnoDB DEFAULT CHARSET=latin1"
    );
}

#[tokio::test]
async fn prefixed_table_names_feed_index_names() {
    let (_, mut structure) = setup();
    structure
        .table("posts", None)
        .prefix("cms_")
        .primary("id")
        .column("slug", "varchar(80)", false, &["unique"]);

    let sql = statements(&mut structure, false, false).await;
    assert!(sql[0].starts_with("CREATE TABLE `cms_posts`"));
    assert!(sql[0].contains("UNIQUE INDEX `UX_cms_posts` (`slug`)"));
}

#[tokio::test]
async fn drop_table_recreates() {
    let (driver, mut structure) = setup();
    live_table(&driver, "posts", &[int_column("id")]);

    declare_posts(&mut structure);
    let sql = statements(&mut structure, false, true).await;
    assert_eq!(sql.len(), 2);
    assert_eq!(sql[0], "DROP TABLE `posts`");
    assert!(sql[1].starts_with("CREATE TABLE `posts`"));
}

// =============================================================================
// Altering columns
// =============================================================================

#[tokio::test]
async fn new_column_keeps_declared_position() {
    let (driver, mut structure) = setup();
    live_table(&driver, "t", &[int_column("a"), int_column("b")]);

    structure
        .table("t", None)
        .column("a", "int(10)", true, &[])
        .column("c", "int(10)", true, &[])
        .column("b", "int(10)", true, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(sql, vec!["ALTER TABLE `t` ADD COLUMN `c` int(10) AFTER `a`"]);

    structure
        .table("t", None)
        .column("z", "varchar(5)", false, &[])
        .column("a", "int(10)", true, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(
        sql,
        vec!["ALTER TABLE `t` ADD COLUMN `z` varchar(5) NOT NULL FIRST"]
    );
}

#[tokio::test]
async fn changed_definition_is_modified() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[int_column("a"), ColumnSpec::new("name", "varchar").length(20)],
    );

    structure
        .table("t", None)
        .column("a", "int(10)", true, &[])
        .column("name", "varchar(64)", "anon", &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(
        sql,
        vec!["ALTER TABLE `t` MODIFY COLUMN `name` varchar(64) NOT NULL DEFAULT 'anon'"]
    );
}

#[tokio::test]
async fn additive_by_default_explicit_drops() {
    let (driver, mut structure) = setup();
    driver.add_table(
        "t",
        live_table(
            &driver,
            "t",
            &[int_column("a"), int_column("legacy"), int_column("b")],
        )
        .index("IX_t_a", KeyKind::Index, &["a"])
        .index("IX_t_legacy", KeyKind::Index, &["legacy"]),
    );

    let declare = |structure: &mut Structure| {
        structure
            .table("t", None)
            .column("a", "int(10)", true, &[])
            .column("b", "int(10)", true, &[]);
    };

    declare(&mut structure);
    assert!(statements(&mut structure, false, false).await.is_empty());

    declare(&mut structure);
    let sql = statements(&mut structure, true, false).await;
    // The legacy index goes away with its only column.
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE `t` DROP COLUMN `legacy`",
            "ALTER TABLE `t` DROP INDEX `IX_t_a`",
        ]
    );

    declare(&mut structure);
    plan_and_apply(&driver, &mut structure, true, false).await;
    let live = driver.table("t").unwrap();
    assert_eq!(live.columns.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(live.indexes.is_empty());
    assert!(structure.plan(true, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn additive_cycles_keep_surplus_index() {
    let (driver, mut structure) = setup();
    driver.add_table(
        "t",
        live_table(&driver, "t", &[int_column("a"), int_column("b")])
            .index("IX_t_extra", KeyKind::Index, &["b"]),
    );

    for _ in 0..3 {
        structure
            .table("t", None)
            .column("a", "int(10)", true, &["unique"])
            .column("b", "int(10)", true, &[]);
        let changes = plan_and_apply(&driver, &mut structure, false, false).await;
        assert!(
            !changes
                .iter()
                .any(|c| matches!(c, SchemaChange::DropIndex { .. }))
        );
        structure.reset();
    }

    let live = driver.table("t").unwrap();
    let names: Vec<&str> = live.indexes.iter().map(|r| r.key_name.as_str()).collect();
    assert_eq!(names, vec!["IX_t_extra", "UX_t"]);
}

#[tokio::test]
async fn rename_runs_before_column_changes() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[int_column("id"), ColumnSpec::new("heading", "varchar").length(100)],
    );

    let declare = |structure: &mut Structure| {
        structure
            .table("t", None)
            .column("id", "int(10)", true, &[])
            .column("title", "varchar(200)", true, &[])
            .rename_column("heading", "title");
    };

    declare(&mut structure);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE `t` CHANGE COLUMN `heading` `title` varchar(100)",
            "ALTER TABLE `t` MODIFY COLUMN `title` varchar(200)",
        ]
    );

    declare(&mut structure);
    plan_and_apply(&driver, &mut structure, false, false).await;
    // Already renamed: the request is a no-op.
    assert!(structure.plan(false, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn ambiguous_rename_fails() {
    let (driver, mut structure) = setup();
    live_table(&driver, "t", &[int_column("id")]);

    structure
        .table("t", None)
        .column("id", "int(10)", true, &[])
        .rename_column("missing", "other");
    let err = structure.converge(false, false).await.unwrap_err();
    assert!(matches!(err, StructureError::AmbiguousRename { .. }));
    // The definition is reset even on failure.
    assert!(structure.definition().columns.is_empty());
}

#[tokio::test]
async fn rename_to_same_name_is_noop() {
    let (driver, mut structure) = setup();
    live_table(&driver, "t", &[int_column("a")]);

    structure
        .table("t", None)
        .column("a", "int(10)", true, &[])
        .rename_column("a", "a");
    assert!(statements(&mut structure, false, false).await.is_empty());
}

#[tokio::test]
async fn undeclared_display_width_matches_live() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[
            ColumnSpec::new("views", "int")
                .length(11)
                .not_null()
                .default(DefaultValue::Integer(0)),
            ColumnSpec::new("total", "bigint").length(20),
            ColumnSpec::new("price", "decimal").length(10).precision(0),
        ],
    );

    let declare = |structure: &mut Structure| {
        structure
            .table("t", None)
            .column("views", "int", 0, &[])
            .column("total", "bigint", true, &[])
            .column("price", "decimal", true, &[]);
    };

    declare(&mut structure);
    assert!(statements(&mut structure, false, false).await.is_empty());
    declare(&mut structure);
    assert!(statements(&mut structure, false, false).await.is_empty());
}

#[tokio::test]
async fn bare_decimal_differs_from_wider_live() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[ColumnSpec::new("price", "decimal").length(12).precision(2)],
    );

    structure.table("t", None).column("price", "decimal", true, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(sql, vec!["ALTER TABLE `t` MODIFY COLUMN `price` decimal"]);
}

#[tokio::test]
async fn timestamp_default_is_expression() {
    let (driver, mut structure) = setup();
    let declare = |structure: &mut Structure| {
        structure
            .table("t", None)
            .primary("id")
            .column("created", "timestamp", "CURRENT_TIMESTAMP", &[]);
    };

    declare(&mut structure);
    let sql = statements(&mut structure, false, false).await;
    assert!(sql[0].contains("`created` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP"));
    assert!(!sql[0].contains("'CURRENT_TIMESTAMP'"));

    declare(&mut structure);
    plan_and_apply(&driver, &mut structure, false, false).await;
    assert!(structure.plan(false, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn mariadb_timestamp_default_matches() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[ColumnSpec::new("created", "timestamp")
            .not_null()
            .default(DefaultValue::Text("current_timestamp()".into()))],
    );

    structure
        .table("t", None)
        .column("created", "timestamp", "CURRENT_TIMESTAMP", &[]);
    assert!(statements(&mut structure, false, false).await.is_empty());
}

#[tokio::test]
async fn primary_added_to_table_without_one() {
    let (driver, mut structure) = setup();
    live_table(&driver, "t", &[ColumnSpec::new("name", "varchar").length(20)]);

    structure
        .table("t", None)
        .primary("id")
        .column("name", "varchar(20)", true, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(
        sql,
        vec!["ALTER TABLE `t` ADD COLUMN `id` int(10) NOT NULL AUTO_INCREMENT PRIMARY KEY FIRST"]
    );

    structure
        .table("t", None)
        .primary("id")
        .column("name", "varchar(20)", true, &[]);
    plan_and_apply(&driver, &mut structure, false, false).await;
    assert!(structure.plan(false, false).await.unwrap().is_empty());
}

// =============================================================================
// Enum to integer migration
// =============================================================================

#[tokio::test]
async fn numeric_enum_options_are_remapped() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[ColumnSpec::new("level", "enum")
            .values(["5", "10", "x"])
            .not_null()],
    );

    structure
        .table("t", None)
        .column("level", "tinyint(3)", false, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE `t` MODIFY COLUMN `level` tinyint(3) NOT NULL",
            "UPDATE `t` SET `level` = CASE `level` WHEN 1 THEN 5 WHEN 2 THEN 10 ELSE `level` END",
        ]
    );
}

#[tokio::test]
async fn enum_migration_is_applied_once() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[ColumnSpec::new("level", "enum")
            .values(["5", "10"])
            .not_null()],
    );

    let declare = |structure: &mut Structure| {
        structure
            .table("t", None)
            .column("level", "tinyint(3)", false, &[]);
    };

    declare(&mut structure);
    let changes = plan_and_apply(&driver, &mut structure, false, false).await;
    assert_eq!(changes.len(), 2);
    assert!(structure.plan(false, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn set_to_integer_keeps_bitmasks() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[ColumnSpec::new("flags", "set").values(["1", "2", "4"])],
    );

    structure.table("t", None).column("flags", "int(10)", true, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(sql, vec!["ALTER TABLE `t` MODIFY COLUMN `flags` int(10)"]);
}

#[tokio::test]
async fn non_numeric_enum_options_keep_positions() {
    let (driver, mut structure) = setup();
    live_table(
        &driver,
        "t",
        &[ColumnSpec::new("state", "enum").values(["draft", "live"])],
    );

    structure.table("t", None).column("state", "int(10)", true, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(sql, vec!["ALTER TABLE `t` MODIFY COLUMN `state` int(10)"]);
}

// =============================================================================
// Indexes and engines
// =============================================================================

#[tokio::test]
async fn changed_index_is_dropped_and_added() {
    let (driver, mut structure) = setup();
    driver.add_table(
        "t",
        live_table(&driver, "t", &[int_column("a"), int_column("b")])
            .index("UX_t", KeyKind::Unique, &["a"]),
    );

    structure
        .table("t", None)
        .column("a", "int(10)", true, &["unique"])
        .column("b", "int(10)", true, &["unique", "index"]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE `t` DROP INDEX `UX_t`",
            "ALTER TABLE `t` ADD UNIQUE INDEX `UX_t` (`a`, `b`)",
            "ALTER TABLE `t` ADD INDEX `IX_t_b` (`b`)",
        ]
    );
}

#[tokio::test]
async fn fulltext_picks_capable_engine() {
    let (_, mut structure) = setup_with(no_fulltext_default());
    structure
        .table("docs", None)
        .primary("id")
        .column("body", "text", true, &["fulltext"]);

    let sql = statements(&mut structure, false, false).await;
    assert!(sql[0].contains("FULLTEXT INDEX `FT_docs` (`body`)"));
    assert!(sql[0].ends_with("ENGINE=MyISAM DEFAULT CHARSET=utf8mb4"));
}

#[tokio::test]
async fn fulltext_skipped_without_capable_engine() {
    let (_, mut structure) =
        setup_with(MemoryDriver::with_engines(vec![
            EngineInfo::new("InnoDB", false).default_engine(),
        ]));
    structure
        .table("docs", None)
        .primary("id")
        .column("body", "text", true, &["fulltext"]);

    let sql = statements(&mut structure, false, false).await;
    assert!(!sql[0].contains("FULLTEXT"));
    assert!(sql[0].ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"));
}

#[tokio::test]
async fn engine_change_drops_fulltext_first() {
    let (driver, mut structure) = setup();
    driver.add_table(
        "docs",
        live_table(&driver, "docs", &[ColumnSpec::new("body", "text")])
            .index("FT_docs", KeyKind::Fulltext, &["body"]),
    );

    structure
        .table("docs", None)
        .engine("MEMORY", true)
        .column("body", "text", true, &["fulltext"]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(
        sql,
        vec![
            "ALTER TABLE `docs` DROP INDEX `FT_docs`",
            "ALTER TABLE `docs` ENGINE=MEMORY",
        ]
    );
}

#[tokio::test]
async fn fulltext_skipped_on_existing_table() {
    let (driver, mut structure) =
        setup_with(MemoryDriver::with_engines(vec![
            EngineInfo::new("InnoDB", false).default_engine(),
        ]));
    live_table(&driver, "docs", &[int_column("id"), ColumnSpec::new("body", "text")]);

    let declare = |structure: &mut Structure| {
        structure
            .table("docs", None)
            .column("id", "int(10)", true, &[])
            .column("body", "text", true, &["fulltext"]);
    };

    declare(&mut structure);
    assert!(statements(&mut structure, false, false).await.is_empty());
    declare(&mut structure);
    assert!(statements(&mut structure, true, false).await.is_empty());
}

#[tokio::test]
async fn engine_change_is_applied_once() {
    let (driver, mut structure) = setup();
    driver.add_table(
        "docs",
        live_table(&driver, "docs", &[ColumnSpec::new("body", "text")])
            .index("FT_docs", KeyKind::Fulltext, &["body"]),
    );

    let declare = |structure: &mut Structure| {
        structure
            .table("docs", None)
            .engine("MEMORY", true)
            .column("body", "text", true, &["fulltext"]);
    };

    declare(&mut structure);
    plan_and_apply(&driver, &mut structure, false, false).await;
    let live = driver.table("docs").unwrap();
    assert_eq!(live.engine.as_deref(), Some("MEMORY"));
    assert!(live.indexes.is_empty());
    assert!(structure.plan(false, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn unavailable_engine_is_ignored() {
    let (driver, mut structure) = setup();
    live_table(&driver, "t", &[int_column("a")]);

    structure
        .table("t", None)
        .engine("Archive", true)
        .column("a", "int(10)", true, &[]);
    assert!(statements(&mut structure, false, false).await.is_empty());

    // Without the check the request is passed through.
    structure
        .table("t", None)
        .engine("MyISAM", false)
        .column("a", "int(10)", true, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(sql, vec!["ALTER TABLE `t` ENGINE=MyISAM"]);
}

// =============================================================================
// Execution
// =============================================================================

#[tokio::test]
async fn failed_statement_aborts_batch() {
    let (driver, mut structure) = setup();
    live_table(&driver, "t", &[int_column("a")]);
    driver.fail_on("`c2`");

    structure
        .table("t", None)
        .column("a", "int(10)", true, &[])
        .column("c1", "int(10)", true, &[])
        .column("c2", "int(10)", true, &[])
        .column("c3", "int(10)", true, &[]);
    let err = structure.converge(false, false).await.unwrap_err();

    match err {
        StructureError::StatementFailed { statement, .. } => {
            assert_eq!(
                statement,
                "ALTER TABLE `t` ADD COLUMN `c2` int(10) AFTER `c1`"
            );
        }
        other => panic!("Expected StatementFailed, got {other}"),
    }
    assert_eq!(
        driver.queries(),
        vec!["ALTER TABLE `t` ADD COLUMN `c1` int(10) AFTER `a`"]
    );
}

#[tokio::test]
async fn captured_statements_accumulate() {
    let (driver, mut structure) = setup();
    structure.capture(true);

    declare_posts(&mut structure);
    structure.converge(false, false).await.unwrap();
    structure
        .table("tags", None)
        .primary("id")
        .column("label", "varchar(40)", false, &[]);
    structure.converge(false, false).await.unwrap();

    let captured = structure.take_captured();
    assert_eq!(captured.len(), 2);
    assert!(captured[1].starts_with("CREATE TABLE `tags`"));
    assert!(driver.queries().is_empty());
    assert!(driver.table("posts").is_none());
}

#[tokio::test]
async fn unknown_type_is_rejected() {
    let (driver, mut structure) = setup();
    structure
        .table("t", None)
        .column("shape", "geometry", true, &[]);
    let err = structure.converge(false, false).await.unwrap_err();
    assert!(matches!(
        err,
        StructureError::UnsupportedType { ref sql_type, .. } if sql_type == "geometry"
    ));
    assert!(driver.queries().is_empty());
}

#[tokio::test]
async fn empty_live_table_gets_first_column() {
    let (driver, mut structure) = setup();
    driver.add_table("empty", MemoryTable::new());

    structure.table("empty", None).column("a", "int(10)", true, &[]);
    let sql = statements(&mut structure, false, false).await;
    assert_eq!(sql, vec!["ALTER TABLE `empty` ADD COLUMN `a` int(10) FIRST"]);
}
