//! # drift-ddl
//!
//! Dialect-aware DDL model and diff engine for the Drift migration kit.
//!
//! This crate provides functionality for:
//! - A typed DDL entity model keyed by name, schema and table
//! - A conflict-aware store holding one collection per entity kind
//! - Lowering of authored (interim) schemas into explicit DDL entities
//! - Set-based diffing between two stores with rename detection
//! - **Rename cascading** into every name-based reference field
//! - SQL rendering through a pluggable dialect grammar
//!
//! ## Architecture
//!
//! Two [`store::DdlStore`]s are compared kind by kind in dependency
//! order. Entities present only on one side are creates or drops; a
//! [`resolver::RenameResolver`] may pair some of them up as renames,
//! which are then cascaded into dependent entities before lower kinds
//! diff. The resulting changes are ordered into phases and rendered by
//! a [`grammar::SqlGrammar`].
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ InterimSchema │────▶│   DdlStore   │────▶│  Diff Engine │
//! └───────────────┘     └──────────────┘     └──────────────┘
//!                              ▲                    │
//!                       ┌──────────────┐            ▼
//!                       │ prior state  │     ┌──────────────┐
//!                       │ (snapshot)   │     │ SQL Grammar  │
//!                       └──────────────┘     └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use drift_ddl::{ddl_diff, NoRenameResolver, PostgresGrammar};
//!
//! async fn plan(prev: DdlStore, cur: DdlStore) {
//!     let result = ddl_diff(&prev, &cur, &NoRenameResolver, &PostgresGrammar).await;
//!     for statement in &result.sql_statements {
//!         println!("{statement}");
//!     }
//! }
//! ```

pub mod diff;
pub mod entities;
pub mod error;
pub mod grammar;
pub mod interim;
pub mod postgres;
pub mod resolver;
pub mod store;

// Re-exports
pub use diff::{DdlChange, DiffResult, RenameRecord, ddl_diff, ddl_diff_dry};
pub use entities::{
    Check, Column, DdlEntity, Entity, EntityKey, EntityKind, EnumType, FkAction, ForeignKey,
    Generated, Identity, Index, IndexColumn, KIND_ORDER, Policy, PolicyFor, PrimaryKey, Role,
    Schema, Sequence, Table, View,
};
pub use error::{SchemaError, SchemaWarning};
pub use grammar::SqlGrammar;
pub use interim::{
    InterimColumn, InterimIdentity, InterimIndex, InterimSchema, InterimSequence, InterimTable,
    interim_to_ddl,
};
pub use postgres::PostgresGrammar;
pub use resolver::{NoRenameResolver, RenameResolver, Resolution, ScriptedResolver};
pub use store::{Collection, DdlStore, KeyFilter, PushResult};
