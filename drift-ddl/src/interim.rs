//! Interim schema lowering.
//!
//! The interim schema is the user-authored shape of a database: columns
//! carry `primary_key`/`unique` flags, identities and sequences may leave
//! their bounds unset, and indexes may be unnamed. Lowering turns that
//! shape into a fully explicit [`DdlStore`] where every constraint is a
//! named entity, collecting user errors in one batch instead of failing
//! on the first.

use serde::{Deserialize, Serialize};

use crate::entities::{
    Check, Column, DdlEntity, EntityKey, EnumType, ForeignKey, Generated, Identity, Index,
    IndexColumn, Policy, PrimaryKey, Role, Schema, Sequence, Table, View,
};
use crate::error::{SchemaError, SchemaWarning};
use crate::grammar::{
    index_default_name, is_vector_type, pk_default_name, split_sql_type, unique_default_name,
};
use crate::store::DdlStore;

/// A sequence whose bounds may be left to dialect defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimSequence {
    pub schema: String,
    pub name: String,
    pub increment: Option<i64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub start_with: Option<i64>,
    pub cache: Option<i64>,
    pub cycle: bool,
}

/// Identity options with dialect-defaulted bounds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimIdentity {
    pub always: bool,
    pub increment: Option<i64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub start_with: Option<i64>,
    pub cache: Option<i64>,
    pub cycle: bool,
}

/// A column as authored: constraint flags instead of constraint entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimColumn {
    pub name: String,
    pub sql_type: String,
    #[serde(default)]
    pub dimensions: u8,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub generated: Option<Generated>,
    #[serde(default)]
    pub identity: Option<InterimIdentity>,
    /// Single-column primary key shorthand.
    #[serde(default)]
    pub primary_key: bool,
    /// Unique shorthand, lowered to a unique index with a default name.
    #[serde(default)]
    pub unique: bool,
}

/// An index as authored. An unnamed index gets a default name derived
/// from its columns; expression indexes must be named explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimIndex {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<IndexColumn>,
    #[serde(default)]
    pub unique: bool,
    /// Access method; defaults to `btree`.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub where_clause: Option<String>,
}

/// A table as authored, with its dependents nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimTable {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub rls_enabled: bool,
    pub columns: Vec<InterimColumn>,
    #[serde(default)]
    pub indexes: Vec<InterimIndex>,
    #[serde(default)]
    pub checks: Vec<Check>,
    /// Composite primary key columns; column-level `primary_key` flags
    /// are a shorthand for a single-column entry here.
    #[serde(default)]
    pub primary_key: Option<Vec<String>>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

/// The full authored schema, one flat list per top-level kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimSchema {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub enums: Vec<EnumType>,
    #[serde(default)]
    pub sequences: Vec<InterimSequence>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub tables: Vec<InterimTable>,
    #[serde(default)]
    pub views: Vec<View>,
}

/// Integer bounds used to default identity ranges from the column type.
fn int_type_bounds(sql_type: &str) -> (i64, i64) {
    match split_sql_type(sql_type).0 {
        "smallint" | "int2" => (i16::MIN as i64, i16::MAX as i64),
        "integer" | "int" | "int4" => (i32::MIN as i64, i32::MAX as i64),
        _ => (i64::MIN, i64::MAX),
    }
}

/// Fill unset sequence-style bounds directionally: a negative increment
/// counts down from -1 toward the type minimum, a positive one counts up
/// from 1 toward the type maximum. `start_with` defaults to the end the
/// sequence counts away from.
fn resolve_bounds(
    increment: Option<i64>,
    min_value: Option<i64>,
    max_value: Option<i64>,
    start_with: Option<i64>,
    cache: Option<i64>,
    type_bounds: (i64, i64),
) -> (i64, i64, i64, i64, i64) {
    let increment = increment.unwrap_or(1);
    let (min_value, max_value) = if increment < 0 {
        (min_value.unwrap_or(type_bounds.0), max_value.unwrap_or(-1))
    } else {
        (min_value.unwrap_or(1), max_value.unwrap_or(type_bounds.1))
    };
    let start_with = start_with.unwrap_or(if increment < 0 { max_value } else { min_value });
    (increment, min_value, max_value, start_with, cache.unwrap_or(1))
}

fn resolve_sequence(seq: &InterimSequence) -> Sequence {
    let (increment, min_value, max_value, start_with, cache) = resolve_bounds(
        seq.increment,
        seq.min_value,
        seq.max_value,
        seq.start_with,
        seq.cache,
        (i64::MIN, i64::MAX),
    );
    Sequence {
        schema: seq.schema.clone(),
        name: seq.name.clone(),
        increment,
        min_value,
        max_value,
        start_with,
        cache,
        cycle: seq.cycle,
    }
}

fn resolve_identity(identity: &InterimIdentity, sql_type: &str) -> Identity {
    let (increment, min_value, max_value, start_with, cache) = resolve_bounds(
        identity.increment,
        identity.min_value,
        identity.max_value,
        identity.start_with,
        identity.cache,
        int_type_bounds(sql_type),
    );
    Identity {
        always: identity.always,
        increment,
        min_value,
        max_value,
        start_with,
        cache,
        cycle: identity.cycle,
    }
}

struct Lowering {
    store: DdlStore,
    errors: Vec<SchemaError>,
    warnings: Vec<SchemaWarning>,
}

impl Lowering {
    fn push<E: DdlEntity>(&mut self, entity: E, scope: &str) -> bool {
        let key = entity.key();
        if self.store.push_entity(entity.into_entity()).is_conflict() {
            self.errors
                .push(SchemaError::duplicate(E::KIND, key.name, scope));
            false
        } else {
            true
        }
    }

    fn lower_table(&mut self, table: &InterimTable) {
        let scope = format!("{}.{}", table.schema, table.name);
        self.push(
            Table {
                schema: table.schema.clone(),
                name: table.name.clone(),
                rls_enabled: table.rls_enabled,
            },
            &table.schema,
        );

        let mut pk_columns: Vec<String> = table.primary_key.clone().unwrap_or_default();
        let mut unique_columns: Vec<String> = Vec::new();

        for column in &table.columns {
            if column.primary_key && !pk_columns.contains(&column.name) {
                pk_columns.push(column.name.clone());
            }
            if column.unique {
                unique_columns.push(column.name.clone());
            }
            self.push(
                Column {
                    schema: table.schema.clone(),
                    table: table.name.clone(),
                    name: column.name.clone(),
                    sql_type: column.sql_type.clone(),
                    dimensions: column.dimensions,
                    not_null: column.not_null || column.primary_key,
                    default: column.default.clone(),
                    generated: column.generated.clone(),
                    identity: column
                        .identity
                        .as_ref()
                        .map(|identity| resolve_identity(identity, &column.sql_type)),
                },
                &scope,
            );
        }

        if !pk_columns.is_empty() {
            let name = pk_default_name(&table.name);
            let key = EntityKey::table_scoped(&table.schema, &table.name, &name);
            // A column-level flag and a composite declaration may both
            // produce the default name; the first wins silently.
            if self.store.pks.get(&key).is_none() {
                self.push(
                    PrimaryKey {
                        schema: table.schema.clone(),
                        table: table.name.clone(),
                        name,
                        columns: pk_columns,
                    },
                    &scope,
                );
            }
        }

        for column in unique_columns {
            let name = unique_default_name(&table.name, &column);
            let key = EntityKey::table_scoped(&table.schema, &table.name, &name);
            if self.store.indexes.get(&key).is_none() {
                self.push(
                    Index {
                        schema: table.schema.clone(),
                        table: table.name.clone(),
                        name,
                        columns: vec![IndexColumn::column(&column)],
                        unique: true,
                        method: "btree".to_string(),
                        where_clause: None,
                    },
                    &scope,
                );
            }
        }

        for index in &table.indexes {
            self.lower_index(table, index, &scope);
        }

        for check in &table.checks {
            self.push(check.clone(), &scope);
        }
        for fk in &table.foreign_keys {
            self.push(fk.clone(), &scope);
        }
    }

    fn lower_index(&mut self, table: &InterimTable, index: &InterimIndex, scope: &str) {
        let name = match &index.name {
            Some(name) => name.clone(),
            None => {
                if index.columns.iter().any(|c| c.is_expression) {
                    self.errors.push(SchemaError::UnnamedIndexExpression {
                        schema: table.schema.clone(),
                        table: table.name.clone(),
                    });
                    return;
                }
                let columns: Vec<String> =
                    index.columns.iter().map(|c| c.value.clone()).collect();
                index_default_name(&table.name, &columns)
            }
        };

        // A vector column indexed without an operator class builds an
        // index the planner will never use.
        for index_column in &index.columns {
            if index_column.is_expression || index_column.opclass.is_some() {
                continue;
            }
            let vectorish = table.columns.iter().any(|c| {
                c.name == index_column.value && is_vector_type(split_sql_type(&c.sql_type).0)
            });
            if vectorish {
                self.errors.push(SchemaError::VectorIndexNoop {
                    schema: table.schema.clone(),
                    table: table.name.clone(),
                    index: name.clone(),
                    column: index_column.value.clone(),
                });
                return;
            }
        }

        self.push(
            Index {
                schema: table.schema.clone(),
                table: table.name.clone(),
                name,
                columns: index.columns.clone(),
                unique: index.unique,
                method: index
                    .method
                    .clone()
                    .unwrap_or_else(|| "btree".to_string()),
                where_clause: index.where_clause.clone(),
            },
            scope,
        );
    }
}

/// Lower an authored schema into an explicit [`DdlStore`].
///
/// All user mistakes are collected into the error batch; the returned
/// store holds everything that lowered cleanly. Callers abort on a
/// non-empty batch. Warnings never block.
pub fn interim_to_ddl(
    interim: &InterimSchema,
) -> (DdlStore, Vec<SchemaError>, Vec<SchemaWarning>) {
    let mut lowering = Lowering {
        store: DdlStore::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    for schema in &interim.schemas {
        lowering.push(
            Schema {
                name: schema.clone(),
            },
            "database",
        );
    }
    for e in &interim.enums {
        let scope = e.schema.clone();
        lowering.push(e.clone(), &scope);
    }
    for seq in &interim.sequences {
        let entity = resolve_sequence(seq);
        let scope = entity.schema.clone();
        lowering.push(entity, &scope);
    }
    for role in &interim.roles {
        lowering.push(role.clone(), "database");
    }
    for table in &interim.tables {
        lowering.lower_table(table);
    }
    for view in &interim.views {
        let scope = view.schema.clone();
        lowering.push(view.clone(), &scope);
    }
    for policy in &interim.policies {
        let table_key = EntityKey::scoped(&policy.schema, &policy.table);
        if lowering.store.tables.get(&table_key).is_none() {
            lowering.warnings.push(SchemaWarning::PolicyNotLinked {
                policy: policy.name.clone(),
                table: policy.table.clone(),
            });
            continue;
        }
        let scope = format!("{}.{}", policy.schema, policy.table);
        lowering.push(policy.clone(), &scope);
    }

    (lowering.store, lowering.errors, lowering.warnings)
}
