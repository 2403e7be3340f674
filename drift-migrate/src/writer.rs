//! Migration file output.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use drift_ddl::DiffResult;

use crate::error::MigrateResult;
use crate::journal::Journal;
use crate::snapshot::Snapshot;

/// Marker placed between statements when breakpoints are enabled, so an
/// applier can execute the file statement by statement.
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// A migration that landed on disk.
#[derive(Debug, Clone)]
pub struct WrittenMigration {
    /// Migration index.
    pub idx: u32,
    /// Tag used in the file name.
    pub tag: String,
    /// Path of the SQL file.
    pub sql_path: PathBuf,
    /// Path of the snapshot file.
    pub snapshot_path: PathBuf,
    /// SHA-256 of the SQL content, hex encoded.
    pub checksum: String,
}

/// Writes migration SQL, its snapshot and the journal entry together.
pub struct MigrationWriter {
    out_dir: PathBuf,
    breakpoints: bool,
}

impl MigrationWriter {
    /// Writer targeting `out_dir`; breakpoints are on by default.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            breakpoints: true,
        }
    }

    /// Toggle statement breakpoints in emitted SQL.
    pub fn breakpoints(mut self, breakpoints: bool) -> Self {
        self.breakpoints = breakpoints;
        self
    }

    /// The `meta/` directory under the output directory.
    pub fn meta_dir(&self) -> PathBuf {
        self.out_dir.join("meta")
    }

    /// Render a diff into one SQL file body.
    pub fn render_sql(&self, diff: &DiffResult) -> String {
        let separator = if self.breakpoints {
            format!("\n{}\n", STATEMENT_BREAKPOINT)
        } else {
            "\n".to_string()
        };
        let mut sql = diff.sql_statements.join(&separator);
        sql.push('\n');
        sql
    }

    /// Write the SQL file, its snapshot and the journal entry. Nothing
    /// is written until all content has been rendered, so a render
    /// failure leaves the directory untouched.
    pub async fn write(
        &self,
        tag: &str,
        diff: &DiffResult,
        snapshot: &Snapshot,
        journal: &mut Journal,
    ) -> MigrateResult<WrittenMigration> {
        let meta_dir = self.meta_dir();
        tokio::fs::create_dir_all(&meta_dir).await?;

        let idx = journal.next_idx();
        let sql = self.render_sql(diff);
        let snapshot_json = serde_json::to_string_pretty(snapshot)?;

        let sql_path = self.out_dir.join(format!("{:04}_{}.sql", idx, tag));
        let snapshot_path = meta_dir.join(Snapshot::file_name(idx));

        tokio::fs::write(&sql_path, &sql).await?;
        tokio::fs::write(&snapshot_path, snapshot_json).await?;

        journal.append(tag, self.breakpoints);
        journal.write(&meta_dir).await?;

        Ok(WrittenMigration {
            idx,
            tag: tag.to_string(),
            sql_path,
            snapshot_path,
            checksum: checksum(&sql),
        })
    }
}

/// SHA-256 checksum of migration content, hex encoded.
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// List migration SQL files under `out_dir` in generation order.
pub async fn list_sql_files(out_dir: &Path) -> MigrateResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    if !out_dir.exists() {
        return Ok(paths);
    }

    let mut entries = tokio::fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_sql = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "sql");
        if path.is_file() && is_sql {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_ddl::{DdlStore, Entity, PostgresGrammar, Schema, ddl_diff_dry};
    use pretty_assertions::assert_eq;

    async fn sample_diff() -> DiffResult {
        let mut store = DdlStore::new();
        store.push_entity(Entity::Schema(Schema {
            name: "app".to_string(),
        }));
        ddl_diff_dry(&store, &PostgresGrammar).await
    }

    #[tokio::test]
    async fn test_write_creates_sql_snapshot_and_journal() {
        let dir = tempfile::tempdir().unwrap();
        let diff = sample_diff().await;
        let snapshot = Snapshot::dry("postgresql");
        let mut journal = Journal::new("postgresql");

        let writer = MigrationWriter::new(dir.path());
        let written = writer
            .write("init", &diff, &snapshot, &mut journal)
            .await
            .unwrap();

        assert_eq!(written.idx, 0);
        assert!(written.sql_path.ends_with("0000_init.sql"));
        assert!(written.sql_path.exists());
        assert!(written.snapshot_path.exists());
        assert!(writer.meta_dir().join(crate::journal::JOURNAL_FILE).exists());
        assert_eq!(journal.entries.len(), 1);

        let sql = std::fs::read_to_string(&written.sql_path).unwrap();
        assert_eq!(sql, "CREATE SCHEMA \"app\";\n");
        assert_eq!(written.checksum, checksum(&sql));
    }

    #[tokio::test]
    async fn test_breakpoints_separate_statements() {
        let mut store = DdlStore::new();
        store.push_entity(Entity::Schema(Schema {
            name: "a".to_string(),
        }));
        store.push_entity(Entity::Schema(Schema {
            name: "b".to_string(),
        }));
        let diff = ddl_diff_dry(&store, &PostgresGrammar).await;

        let writer = MigrationWriter::new("unused");
        let sql = writer.render_sql(&diff);
        assert_eq!(
            sql,
            "CREATE SCHEMA \"a\";\n--> statement-breakpoint\nCREATE SCHEMA \"b\";\n"
        );

        let plain = MigrationWriter::new("unused").breakpoints(false);
        assert_eq!(
            plain.render_sql(&diff),
            "CREATE SCHEMA \"a\";\nCREATE SCHEMA \"b\";\n"
        );
    }

    #[tokio::test]
    async fn test_list_sql_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0001_b.sql", "0000_a.sql", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }

        let files = list_sql_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["0000_a.sql", "0001_b.sql"]);
    }
}
