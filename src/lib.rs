//! # Drift
//!
//! A snapshot-based schema migration kit for SQL databases.
//!
//! Drift provides:
//! - A typed DDL model with name-keyed entities per kind
//! - Set-based schema diffing with rename detection and cascading
//! - PostgreSQL statement generation in dependency order
//! - Snapshot and journal files, so generation needs no database
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use drift_kit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> MigrateResult<()> {
//!     let schema = InterimSchema {
//!         schemas: vec!["public".to_string()],
//!         ..Default::default()
//!     };
//!
//!     let config = GenerateConfig::new().out_dir("./drift");
//!     let engine = GenerateEngine::new(config)?;
//!
//!     let outcome = engine.generate(&schema, &NoRenameResolver).await?;
//!     println!("{}", outcome.summary);
//!     Ok(())
//! }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

/// DDL model, stores and the diff engine.
pub mod ddl {
    pub use drift_ddl::*;
}

/// Snapshot files, journal and the generation engine.
pub mod migrate {
    pub use drift_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::ddl::{
        DdlStore, InterimSchema, NoRenameResolver, PostgresGrammar, RenameResolver,
        ScriptedResolver, ddl_diff, ddl_diff_dry, interim_to_ddl,
    };
    pub use crate::migrate::{GenerateConfig, GenerateEngine, MigrateResult, MigrationError};
}

// Re-export key types at the crate root
pub use drift_ddl::{DdlStore, DiffResult, InterimSchema, SchemaError, SchemaWarning};
pub use drift_migrate::{GenerateConfig, GenerateEngine, MigrateResult, MigrationError, Snapshot};
