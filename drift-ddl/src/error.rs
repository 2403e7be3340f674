//! Error and warning types for schema population and diffing.

use thiserror::Error;

use crate::entities::EntityKind;

/// A blocking schema error.
///
/// These are user-facing schema mistakes. They are collected into a list
/// during interim conversion and reported in one batch; any non-empty
/// batch aborts the run before a single statement is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two entities of one kind share a composite key.
    #[error("duplicate {kind} '{name}' in {scope}")]
    Duplicate {
        /// Entity kind.
        kind: EntityKind,
        /// Entity name.
        name: String,
        /// Owning scope (schema or table path).
        scope: String,
    },

    /// An index over an expression must carry an explicit name.
    #[error("index on '{schema}.{table}' uses an expression and must be named explicitly")]
    UnnamedIndexExpression {
        /// Schema name.
        schema: String,
        /// Table name.
        table: String,
    },

    /// A vector-typed index column without an operator class would be a
    /// no-op index in the target dialect.
    #[error(
        "index '{index}' on '{schema}.{table}' covers vector column '{column}' without an operator class and would be a no-op"
    )]
    VectorIndexNoop {
        /// Schema name.
        schema: String,
        /// Table name.
        table: String,
        /// Index name.
        index: String,
        /// Offending column.
        column: String,
    },
}

impl SchemaError {
    /// Create a duplicate-name error.
    pub fn duplicate(kind: EntityKind, name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::Duplicate {
            kind,
            name: name.into(),
            scope: scope.into(),
        }
    }
}

/// A non-blocking schema warning. Printed, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaWarning {
    /// A policy references a table that does not exist; the policy is
    /// dropped from the schema.
    #[error("policy '{policy}' is not linked to any table (references '{table}') and was skipped")]
    PolicyNotLinked {
        /// Policy name.
        policy: String,
        /// The table name the policy referenced.
        table: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_display() {
        let err = SchemaError::duplicate(EntityKind::Table, "users", "public");
        assert_eq!(err.to_string(), "duplicate table 'users' in public");
    }

    #[test]
    fn test_vector_noop_display() {
        let err = SchemaError::VectorIndexNoop {
            schema: "public".to_string(),
            table: "docs".to_string(),
            index: "docs_embedding_index".to_string(),
            column: "embedding".to_string(),
        };
        assert!(err.to_string().contains("no-op"));
    }
}
