//! Snapshot files.
//!
//! A snapshot is the serialized [`DdlStore`] state after a generated
//! migration, stored as JSON under `meta/`. Snapshots form a chain
//! through `prev_id`; the latest one is the prior state for the next
//! diff, so generation never needs a live database.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use drift_ddl::{DdlStore, Entity, RenameRecord};

use crate::error::{MigrateResult, MigrationError};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: &str = "1";

/// Suffix of snapshot files under `meta/`.
const SNAPSHOT_SUFFIX: &str = "_snapshot.json";

/// Serialized schema state after one migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version; a mismatch makes the file unusable.
    pub version: String,
    /// SQL dialect the entities were authored for.
    pub dialect: String,
    /// Unique id of this snapshot.
    pub id: Uuid,
    /// Id of the snapshot this one was diffed against, if any.
    pub prev_id: Option<Uuid>,
    /// All entities, flattened in kind order.
    pub ddl: Vec<Entity>,
    /// Renames confirmed while generating this migration.
    pub renames: Vec<RenameRecord>,
}

impl Snapshot {
    /// Snapshot of the empty database, used when no prior snapshot
    /// exists. Its id is the nil UUID so the first real snapshot has a
    /// stable ancestor.
    pub fn dry(dialect: impl Into<String>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            dialect: dialect.into(),
            id: Uuid::nil(),
            prev_id: None,
            ddl: Vec::new(),
            renames: Vec::new(),
        }
    }

    /// Snapshot a store, chained onto `prev`.
    pub fn of_store(
        dialect: impl Into<String>,
        prev: &Snapshot,
        store: &DdlStore,
        renames: Vec<RenameRecord>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            dialect: dialect.into(),
            id: Uuid::new_v4(),
            prev_id: Some(prev.id),
            ddl: store.entities(),
            renames,
        }
    }

    /// Rebuild the store this snapshot serializes.
    pub fn to_store(&self) -> MigrateResult<DdlStore> {
        DdlStore::from_entities(self.ddl.clone()).map_err(MigrationError::schema)
    }

    /// Read one snapshot file.
    pub async fn read(path: &Path) -> MigrateResult<Snapshot> {
        let raw = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(MigrationError::invalid_snapshot(
                path.display().to_string(),
                format!(
                    "version '{}' is not supported (expected '{}')",
                    snapshot.version, SNAPSHOT_VERSION
                ),
            ));
        }
        Ok(snapshot)
    }

    /// Read the latest snapshot under `meta_dir`, if any. Snapshot
    /// files are index-prefixed, so lexical order is generation order.
    pub async fn read_latest(meta_dir: &Path) -> MigrateResult<Option<Snapshot>> {
        if !meta_dir.exists() {
            return Ok(None);
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(meta_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_snapshot = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SNAPSHOT_SUFFIX));
            if is_snapshot {
                paths.push(path);
            }
        }

        paths.sort();
        match paths.last() {
            Some(path) => Ok(Some(Self::read(path).await?)),
            None => Ok(None),
        }
    }

    /// File name for the snapshot of migration `idx`.
    pub fn file_name(idx: u32) -> String {
        format!("{:04}{}", idx, SNAPSHOT_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_ddl::{Entity, Schema};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_read_latest_picks_highest_index() {
        let dir = tempfile::tempdir().unwrap();

        let first = Snapshot::dry("postgresql");
        let mut store = DdlStore::new();
        store.push_entity(Entity::Schema(Schema {
            name: "public".to_string(),
        }));
        let second = Snapshot::of_store("postgresql", &first, &store, Vec::new());

        for (idx, snapshot) in [(0u32, &first), (1u32, &second)] {
            let path = dir.path().join(Snapshot::file_name(idx));
            tokio::fs::write(&path, serde_json::to_string_pretty(snapshot).unwrap())
                .await
                .unwrap();
        }

        let latest = Snapshot::read_latest(dir.path()).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.prev_id, Some(Uuid::nil()));
        assert_eq!(latest.to_store().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_latest_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Snapshot::read_latest(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = Snapshot::dry("postgresql");
        snapshot.version = "99".to_string();

        let path = dir.path().join(Snapshot::file_name(0));
        tokio::fs::write(&path, serde_json::to_string(&snapshot).unwrap())
            .await
            .unwrap();

        let err = Snapshot::read(&path).await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidSnapshot { .. }));
    }
}
