//! The dialect grammar collaborator.
//!
//! The diff engine decides *that* a change is needed; a [`SqlGrammar`]
//! implementation decides how to spell it. Grammars are pure string
//! transformers with no side effects.

use crate::diff::DdlChange;
use crate::store::DdlStore;

/// Renders DDL changes as SQL statements for one dialect.
pub trait SqlGrammar: Send + Sync {
    /// Dialect tag recorded in snapshots (e.g. `"postgresql"`).
    fn dialect(&self) -> &'static str;

    /// Render one change as zero or more `;`-terminated statements.
    ///
    /// `target` is the store the change belongs to (the current store
    /// for creates and alters); grammars use it to inline contained
    /// entities, e.g. columns and the primary key into `CREATE TABLE`.
    fn render(&self, change: &DdlChange, target: &DdlStore) -> Vec<String>;
}

/// Split a SQL type string into its base name and parenthesized
/// parameters, e.g. `"varchar(255)"` into `("varchar", Some("255"))`.
pub fn split_sql_type(sql_type: &str) -> (&str, Option<&str>) {
    match sql_type.find('(') {
        Some(open) if sql_type.ends_with(')') => {
            let base = sql_type[..open].trim_end();
            let params = &sql_type[open + 1..sql_type.len() - 1];
            (base, Some(params))
        }
        _ => (sql_type, None),
    }
}

/// Format a default value expression for embedding in DDL.
///
/// Values already shaped like expressions (function calls, casts,
/// numerics, booleans, quoted strings) pass through untouched; bare
/// words are single-quoted as string literals.
pub fn default_to_sql(value: &str) -> String {
    let trimmed = value.trim();
    let passthrough = trimmed.is_empty()
        || trimmed.starts_with('\'')
        || trimmed.contains('(')
        || trimmed.contains("::")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("false")
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.parse::<f64>().is_ok();

    if passthrough {
        trimmed.to_string()
    } else {
        format!("'{}'", trimmed.replace('\'', "''"))
    }
}

/// Default name for a column-level primary key constraint.
pub fn pk_default_name(table: &str) -> String {
    format!("{}_pkey", table)
}

/// Default name for a column-level unique constraint's backing index.
pub fn unique_default_name(table: &str, column: &str) -> String {
    format!("{}_{}_key", table, column)
}

/// Default name for an index derived from its column list.
pub fn index_default_name(table: &str, columns: &[String]) -> String {
    format!("{}_{}_index", table, columns.join("_"))
}

/// Whether a SQL type belongs to the vector family, where an index
/// without an operator class is a no-op.
pub fn is_vector_type(sql_type: &str) -> bool {
    let (base, _) = split_sql_type(sql_type);
    matches!(base, "vector" | "halfvec" | "sparsevec")
}
