//! # drift-migrate
//!
//! Migration generation for the Drift kit.
//!
//! This crate provides functionality for:
//! - Snapshot files that persist schema state between runs
//! - A journal recording every generated migration
//! - SQL file output with optional statement breakpoints
//! - A generation engine tying lowering, diffing and writing together
//! - One-shot SQL export against the empty database
//!
//! ## Architecture
//!
//! Generation is purely file based. The prior state is the latest
//! snapshot under `meta/`, never a live database; the authored schema
//! is lowered and diffed against it, and the resulting SQL, the new
//! snapshot and the journal entry land together.
//!
//! ```text
//! drift/
//! ├── 0000_init.sql
//! ├── 0001_add_posts.sql
//! └── meta/
//!     ├── _journal.json
//!     ├── 0000_snapshot.json
//!     └── 0001_snapshot.json
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use drift_ddl::NoRenameResolver;
//! use drift_migrate::{GenerateConfig, GenerateEngine};
//!
//! async fn generate(schema: drift_ddl::InterimSchema) -> drift_migrate::MigrateResult<()> {
//!     let config = GenerateConfig::new()
//!         .out_dir("./drift")
//!         .tag("add_posts");
//!     let engine = GenerateEngine::new(config)?;
//!
//!     let outcome = engine.generate(&schema, &NoRenameResolver).await?;
//!     println!("{}", outcome.summary);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod journal;
pub mod snapshot;
pub mod writer;

// Re-exports
pub use engine::{GenerateConfig, GenerateEngine, GenerateOutcome};
pub use error::{MigrateResult, MigrationError};
pub use journal::{Journal, JournalEntry};
pub use snapshot::{SNAPSHOT_VERSION, Snapshot};
pub use writer::{MigrationWriter, STATEMENT_BREAKPOINT, WrittenMigration, checksum, list_sql_files};
