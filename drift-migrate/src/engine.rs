//! Migration generation engine.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use drift_ddl::{
    DdlStore, InterimSchema, PostgresGrammar, RenameResolver, SqlGrammar, ddl_diff, ddl_diff_dry,
    interim_to_ddl,
};

use crate::error::{MigrateResult, MigrationError};
use crate::journal::Journal;
use crate::snapshot::Snapshot;
use crate::writer::MigrationWriter;

/// Configuration for migration generation.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Directory migrations are written to.
    pub out_dir: PathBuf,
    /// Target SQL dialect.
    pub dialect: String,
    /// Tag for the generated file; defaults to a timestamp.
    pub tag: Option<String>,
    /// Emit statement breakpoints in SQL files.
    pub breakpoints: bool,
}

impl GenerateConfig {
    /// Defaults: `./drift` output, PostgreSQL, breakpoints on.
    pub fn new() -> Self {
        Self {
            out_dir: PathBuf::from("drift"),
            dialect: "postgresql".to_string(),
            tag: None,
            breakpoints: true,
        }
    }

    /// Set the output directory.
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Set the target dialect.
    pub fn dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = dialect.into();
        self
    }

    /// Set the migration tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Toggle statement breakpoints.
    pub fn breakpoints(mut self, breakpoints: bool) -> Self {
        self.breakpoints = breakpoints;
        self
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    /// Path of the written SQL file; `None` when there were no changes.
    pub sql_path: Option<PathBuf>,
    /// Number of emitted statements.
    pub statement_count: usize,
    /// Human-readable change summary.
    pub summary: String,
}

impl GenerateOutcome {
    fn no_changes() -> Self {
        Self {
            sql_path: None,
            statement_count: 0,
            summary: "No changes".to_string(),
        }
    }

    /// Whether this run wrote a migration.
    pub fn wrote_migration(&self) -> bool {
        self.sql_path.is_some()
    }
}

/// Generates migrations by diffing the authored schema against the
/// latest snapshot. No database connection is involved.
pub struct GenerateEngine {
    config: GenerateConfig,
    grammar: Arc<dyn SqlGrammar>,
}

impl GenerateEngine {
    /// Build an engine for the configured dialect.
    pub fn new(config: GenerateConfig) -> MigrateResult<Self> {
        let grammar: Arc<dyn SqlGrammar> = match config.dialect.as_str() {
            "postgresql" => Arc::new(PostgresGrammar),
            other => return Err(MigrationError::UnsupportedDialect(other.to_string())),
        };
        Ok(Self { config, grammar })
    }

    /// Generate one migration from the authored schema.
    ///
    /// Loads the latest snapshot as the prior state (the empty database
    /// when none exists), lowers `interim`, diffs, and writes the SQL
    /// file, snapshot and journal entry. Schema errors abort before
    /// anything is written.
    pub async fn generate(
        &self,
        interim: &InterimSchema,
        resolver: &dyn RenameResolver,
    ) -> MigrateResult<GenerateOutcome> {
        let meta_dir = self.config.out_dir.join("meta");

        let prev_snapshot = Snapshot::read_latest(&meta_dir)
            .await?
            .unwrap_or_else(|| Snapshot::dry(&self.config.dialect));
        let prev_store = prev_snapshot.to_store()?;
        debug!(entities = prev_store.len(), "loaded prior snapshot");

        let cur_store = self.lower(interim)?;

        let diff = ddl_diff(&prev_store, &cur_store, resolver, self.grammar.as_ref()).await;
        if diff.is_empty() {
            info!("no schema changes detected");
            return Ok(GenerateOutcome::no_changes());
        }

        let snapshot = Snapshot::of_store(
            &self.config.dialect,
            &prev_snapshot,
            &cur_store,
            diff.renames.clone(),
        );
        let mut journal = Journal::read(&meta_dir)
            .await?
            .unwrap_or_else(|| Journal::new(&self.config.dialect));

        let tag = self
            .config
            .tag
            .clone()
            .unwrap_or_else(|| Utc::now().format("%Y%m%d%H%M%S").to_string());

        let writer =
            MigrationWriter::new(&self.config.out_dir).breakpoints(self.config.breakpoints);
        let written = writer.write(&tag, &diff, &snapshot, &mut journal).await?;
        info!(
            path = %written.sql_path.display(),
            statements = diff.sql_statements.len(),
            "wrote migration"
        );

        Ok(GenerateOutcome {
            sql_path: Some(written.sql_path),
            statement_count: diff.sql_statements.len(),
            summary: diff.summary(),
        })
    }

    /// Render the authored schema as one SQL script against the empty
    /// database, without touching the filesystem.
    pub async fn export_sql(&self, interim: &InterimSchema) -> MigrateResult<String> {
        let store = self.lower(interim)?;
        let diff = ddl_diff_dry(&store, self.grammar.as_ref()).await;
        Ok(diff.sql_statements.join("\n"))
    }

    /// Paths of every generated SQL file in the output directory, in
    /// generation order.
    pub async fn migrations(&self) -> MigrateResult<Vec<PathBuf>> {
        crate::writer::list_sql_files(&self.config.out_dir).await
    }

    /// Lower the authored schema, aborting on any collected error.
    fn lower(&self, interim: &InterimSchema) -> MigrateResult<DdlStore> {
        let (store, errors, warnings) = interim_to_ddl(interim);
        for warning in &warnings {
            warn!(%warning, "schema warning");
        }
        if !errors.is_empty() {
            return Err(MigrationError::schema(errors));
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_ddl::{InterimColumn, InterimTable, NoRenameResolver, ScriptedResolver};
    use pretty_assertions::assert_eq;

    fn column(name: &str, sql_type: &str) -> InterimColumn {
        InterimColumn {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            dimensions: 0,
            not_null: false,
            default: None,
            generated: None,
            identity: None,
            primary_key: false,
            unique: false,
        }
    }

    fn users_schema() -> InterimSchema {
        let mut id = column("id", "integer");
        id.primary_key = true;
        InterimSchema {
            schemas: vec!["public".to_string()],
            tables: vec![InterimTable {
                schema: "public".to_string(),
                name: "users".to_string(),
                rls_enabled: false,
                columns: vec![id, column("name", "text")],
                indexes: Vec::new(),
                checks: Vec::new(),
                primary_key: None,
                foreign_keys: Vec::new(),
            }],
            ..Default::default()
        }
    }

    fn engine(dir: &std::path::Path, tag: &str) -> GenerateEngine {
        GenerateEngine::new(GenerateConfig::new().out_dir(dir).tag(tag)).unwrap()
    }

    #[tokio::test]
    async fn test_first_generation_writes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = engine(dir.path(), "init")
            .generate(&users_schema(), &NoRenameResolver)
            .await
            .unwrap();

        assert!(outcome.wrote_migration());
        let sql_path = outcome.sql_path.unwrap();
        assert!(sql_path.ends_with("0000_init.sql"));

        let sql = std::fs::read_to_string(&sql_path).unwrap();
        assert!(sql.contains("CREATE SCHEMA \"public\";"));
        assert!(sql.contains("CREATE TABLE \"public\".\"users\""));
        assert!(sql.contains("CONSTRAINT \"users_pkey\" PRIMARY KEY (\"id\")"));

        assert!(dir.path().join("meta/0000_snapshot.json").exists());
        assert!(dir.path().join("meta/_journal.json").exists());
    }

    #[tokio::test]
    async fn test_unchanged_schema_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let schema = users_schema();

        engine(dir.path(), "init")
            .generate(&schema, &NoRenameResolver)
            .await
            .unwrap();
        let outcome = engine(dir.path(), "again")
            .generate(&schema, &NoRenameResolver)
            .await
            .unwrap();

        assert!(!outcome.wrote_migration());
        assert_eq!(outcome.summary, "No changes");
        assert!(!dir.path().join("0001_again.sql").exists());
    }

    #[tokio::test]
    async fn test_second_generation_chains_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let mut schema = users_schema();

        engine(dir.path(), "init")
            .generate(&schema, &NoRenameResolver)
            .await
            .unwrap();

        schema.tables[0].columns.push(column("email", "text"));
        let outcome = engine(dir.path(), "add_email")
            .generate(&schema, &NoRenameResolver)
            .await
            .unwrap();

        let sql_path = outcome.sql_path.unwrap();
        assert!(sql_path.ends_with("0001_add_email.sql"));
        let sql = std::fs::read_to_string(&sql_path).unwrap();
        assert_eq!(
            sql.trim(),
            "ALTER TABLE \"public\".\"users\" ADD COLUMN \"email\" text;"
        );

        let first = Snapshot::read(&dir.path().join("meta/0000_snapshot.json"))
            .await
            .unwrap();
        let second = Snapshot::read(&dir.path().join("meta/0001_snapshot.json"))
            .await
            .unwrap();
        assert_eq!(second.prev_id, Some(first.id));

        let journal = Journal::read(&dir.path().join("meta")).await.unwrap().unwrap();
        assert_eq!(journal.entries.len(), 2);

        let migrations = engine(dir.path(), "unused").migrations().await.unwrap();
        assert_eq!(migrations.len(), 2);
        assert!(migrations[0].ends_with("0000_init.sql"));
        assert!(migrations[1].ends_with("0001_add_email.sql"));
    }

    #[tokio::test]
    async fn test_rename_recorded_in_snapshot() {
        use drift_ddl::{EntityKey, EntityKind};

        let dir = tempfile::tempdir().unwrap();
        let mut schema = users_schema();
        // A primary key would be renamed too ("users_pkey" is derived
        // from the table name); keep the diff down to the table rename.
        schema.tables[0].columns[0].primary_key = false;

        engine(dir.path(), "init")
            .generate(&schema, &NoRenameResolver)
            .await
            .unwrap();

        schema.tables[0].name = "accounts".to_string();
        let resolver = ScriptedResolver::new().rename(
            EntityKind::Table,
            EntityKey::scoped("public", "users"),
            EntityKey::scoped("public", "accounts"),
        );
        let outcome = engine(dir.path(), "rename_users")
            .generate(&schema, &resolver)
            .await
            .unwrap();

        let sql = std::fs::read_to_string(outcome.sql_path.unwrap()).unwrap();
        assert_eq!(
            sql.trim(),
            "ALTER TABLE \"public\".\"users\" RENAME TO \"accounts\";"
        );

        let snapshot = Snapshot::read(&dir.path().join("meta/0001_snapshot.json"))
            .await
            .unwrap();
        assert_eq!(snapshot.renames.len(), 1);
        assert_eq!(snapshot.renames[0].kind, EntityKind::Table);
    }

    #[tokio::test]
    async fn test_schema_errors_abort_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut schema = users_schema();
        let duplicate = schema.tables[0].columns[0].clone();
        schema.tables[0].columns.push(duplicate);

        let err = engine(dir.path(), "bad")
            .generate(&schema, &NoRenameResolver)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Schema { .. }));
        assert!(!dir.path().join("0000_bad.sql").exists());
    }

    #[tokio::test]
    async fn test_export_sql_renders_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let sql = engine(dir.path(), "unused")
            .export_sql(&users_schema())
            .await
            .unwrap();

        assert!(sql.contains("CREATE SCHEMA \"public\";"));
        assert!(sql.contains("CREATE TABLE \"public\".\"users\""));
        assert!(!dir.path().join("meta").exists());
    }

    #[test]
    fn test_unknown_dialect_rejected() {
        let Err(err) = GenerateEngine::new(GenerateConfig::new().dialect("mysql")) else {
            panic!("mysql must be rejected, no grammar exists for it");
        };
        assert!(matches!(err, MigrationError::UnsupportedDialect(_)));
    }
}
