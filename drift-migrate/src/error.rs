//! Error types for the migration engine.

use thiserror::Error;

use drift_ddl::SchemaError;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration generation.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot or journal (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The authored schema has user errors. The whole batch is carried
    /// so every mistake can be reported in one run.
    #[error("schema has {} error(s)", errors.len())]
    Schema {
        /// All collected schema errors.
        errors: Vec<SchemaError>,
    },

    /// A snapshot file exists but cannot be used.
    #[error("invalid snapshot '{path}': {reason}")]
    InvalidSnapshot {
        /// Path of the offending snapshot file.
        path: String,
        /// What made it unusable.
        reason: String,
    },

    /// The journal file exists but cannot be used.
    #[error("invalid journal: {0}")]
    InvalidJournal(String),

    /// The configured dialect has no grammar.
    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),
}

impl MigrationError {
    /// Wrap a batch of schema errors.
    pub fn schema(errors: Vec<SchemaError>) -> Self {
        Self::Schema { errors }
    }

    /// Create an invalid-snapshot error.
    pub fn invalid_snapshot(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-journal error.
    pub fn invalid_journal(msg: impl Into<String>) -> Self {
        Self::InvalidJournal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_ddl::EntityKind;

    #[test]
    fn test_schema_error_counts_batch() {
        let err = MigrationError::schema(vec![
            SchemaError::duplicate(EntityKind::Table, "users", "public"),
            SchemaError::duplicate(EntityKind::Column, "id", "public.users"),
        ]);
        assert_eq!(err.to_string(), "schema has 2 error(s)");
    }

    #[test]
    fn test_invalid_snapshot_display() {
        let err = MigrationError::invalid_snapshot("meta/0001_snapshot.json", "version mismatch");
        assert!(err.to_string().contains("0001_snapshot.json"));
        assert!(err.to_string().contains("version mismatch"));
    }
}
