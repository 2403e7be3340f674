//! End-to-end migration generation through the umbrella crate.

use drift_kit::prelude::*;
use drift_kit::ddl::{InterimColumn, InterimTable};

fn blog_schema() -> InterimSchema {
    InterimSchema {
        schemas: vec!["public".to_string()],
        tables: vec![InterimTable {
            schema: "public".to_string(),
            name: "posts".to_string(),
            rls_enabled: false,
            columns: vec![
                InterimColumn {
                    name: "id".to_string(),
                    sql_type: "integer".to_string(),
                    dimensions: 0,
                    not_null: false,
                    default: None,
                    generated: None,
                    identity: None,
                    primary_key: true,
                    unique: false,
                },
                InterimColumn {
                    name: "title".to_string(),
                    sql_type: "text".to_string(),
                    dimensions: 0,
                    not_null: true,
                    default: None,
                    generated: None,
                    identity: None,
                    primary_key: false,
                    unique: false,
                },
            ],
            indexes: Vec::new(),
            checks: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn generate_then_regenerate_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let schema = blog_schema();

    let engine =
        GenerateEngine::new(GenerateConfig::new().out_dir(dir.path()).tag("init")).unwrap();
    let first = engine.generate(&schema, &NoRenameResolver).await.unwrap();
    assert!(first.sql_path.is_some());
    assert!(first.statement_count > 0);

    // Same schema again: the latest snapshot already matches.
    let again =
        GenerateEngine::new(GenerateConfig::new().out_dir(dir.path()).tag("noop")).unwrap();
    let second = again.generate(&schema, &NoRenameResolver).await.unwrap();
    assert!(second.sql_path.is_none());
    assert_eq!(second.summary, "No changes");
}

#[tokio::test]
async fn export_sql_matches_first_migration_content() {
    let dir = tempfile::tempdir().unwrap();
    let schema = blog_schema();

    let engine =
        GenerateEngine::new(GenerateConfig::new().out_dir(dir.path()).tag("init")).unwrap();
    let outcome = engine.generate(&schema, &NoRenameResolver).await.unwrap();

    let exported = engine.export_sql(&schema).await.unwrap();
    let written = std::fs::read_to_string(outcome.sql_path.unwrap()).unwrap();

    // The written file interleaves breakpoint markers; statement content
    // is identical.
    let written_statements: Vec<&str> = written
        .lines()
        .filter(|l| !l.starts_with("--> ") && !l.is_empty())
        .collect();
    let exported_statements: Vec<&str> =
        exported.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(written_statements, exported_statements);
}
