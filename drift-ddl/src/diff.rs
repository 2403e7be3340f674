//! The schema diff engine.
//!
//! Given two [`DdlStore`] snapshots for the same dialect, compute an
//! ordered list of SQL statements transforming the first into the
//! second. Entity kinds are processed strictly sequentially in
//! [`KIND_ORDER`] because each kind's diff depends on earlier kinds'
//! confirmed renames having already been cascaded into reference
//! fields. The only suspension point is the resolver call.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::{
    Column, DdlEntity, Entity, EntityKey, EntityKind, EnumType, KIND_ORDER, Role, Schema, Table,
};
use crate::grammar::SqlGrammar;
use crate::resolver::{NoRenameResolver, RenameResolver};
use crate::store::{Collection, DdlStore};

/// One typed change the diff engine decided on.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlChange {
    /// Entity exists only in the current store.
    Create(Entity),
    /// Entity exists only in the previous store.
    Drop(Entity),
    /// Resolver-confirmed rename.
    Rename {
        /// Previous entity.
        from: Entity,
        /// Current entity.
        to: Entity,
    },
    /// Entity exists in both stores with differing fields.
    Alter {
        /// Previous entity, with confirmed renames already applied.
        from: Entity,
        /// Current entity.
        to: Entity,
    },
}

impl DdlChange {
    /// Kind of the entity this change touches.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Create(e) | Self::Drop(e) => e.kind(),
            Self::Rename { to, .. } | Self::Alter { to, .. } => to.kind(),
        }
    }
}

/// A confirmed rename, persisted alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRecord {
    /// Entity kind.
    pub kind: EntityKind,
    /// Old key path.
    pub from: String,
    /// New key path.
    pub to: String,
}

impl RenameRecord {
    fn new(kind: EntityKind, from: &EntityKey, to: &EntityKey) -> Self {
        Self {
            kind,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Result of one diff run. Ephemeral; exists only for the duration of a
/// generate invocation.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Ordered SQL statements.
    pub sql_statements: Vec<String>,
    /// Confirmed renames.
    pub renames: Vec<RenameRecord>,
    /// The typed changes behind the statements, in emission order.
    pub changes: Vec<DdlChange>,
}

impl DiffResult {
    /// Check if the diff found no differences.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Get a human-readable summary of the diff.
    pub fn summary(&self) -> String {
        let mut creates = 0usize;
        let mut drops = 0usize;
        let mut alters = 0usize;
        for change in &self.changes {
            match change {
                DdlChange::Create(_) => creates += 1,
                DdlChange::Drop(_) => drops += 1,
                DdlChange::Alter { .. } => alters += 1,
                DdlChange::Rename { .. } => {}
            }
        }

        let mut parts = Vec::new();
        if creates > 0 {
            parts.push(format!("{} created", creates));
        }
        if drops > 0 {
            parts.push(format!("{} dropped", drops));
        }
        if alters > 0 {
            parts.push(format!("{} altered", alters));
        }
        if !self.renames.is_empty() {
            parts.push(format!("{} renamed", self.renames.len()));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Per-kind diff outcome before statement emission.
struct KindChanges<E> {
    created: Vec<E>,
    deleted: Vec<E>,
    renamed: Vec<(E, E)>,
    altered: Vec<(E, E)>,
}

/// Kind-erased view of [`KindChanges`], used for phase assembly.
struct ErasedChanges {
    kind: EntityKind,
    created: Vec<Entity>,
    deleted: Vec<Entity>,
    altered: Vec<(Entity, Entity)>,
}

impl<E: DdlEntity> KindChanges<E> {
    fn erase(self) -> ErasedChanges {
        ErasedChanges {
            kind: E::KIND,
            created: self.created.into_iter().map(E::into_entity).collect(),
            deleted: self.deleted.into_iter().map(E::into_entity).collect(),
            altered: self
                .altered
                .into_iter()
                .map(|(from, to)| (from.into_entity(), to.into_entity()))
                .collect(),
        }
    }
}

fn downcast<E: DdlEntity>(entity: Entity) -> E {
    let kind = entity.kind();
    let key = entity.key();
    E::from_entity(entity).unwrap_or_else(|| {
        panic!(
            "resolver returned {} entity '{}' inside a {} partition",
            kind,
            key,
            E::KIND
        )
    })
}

/// Diff one kind: keyed set difference, at most one resolver round, and
/// field-level alter detection.
async fn diff_kind<E: DdlEntity>(
    prev: &Collection<E>,
    cur: &Collection<E>,
    resolver: &dyn RenameResolver,
) -> KindChanges<E> {
    let prev_keys: HashSet<EntityKey> = prev.iter().map(|e| e.key()).collect();
    let cur_keys: HashSet<EntityKey> = cur.iter().map(|e| e.key()).collect();

    let mut created: Vec<E> = cur
        .iter()
        .filter(|e| !prev_keys.contains(&e.key()))
        .cloned()
        .collect();
    let mut deleted: Vec<E> = prev
        .iter()
        .filter(|e| !cur_keys.contains(&e.key()))
        .cloned()
        .collect();
    let mut renamed: Vec<(E, E)> = Vec::new();

    // Created and deleted candidates together are ambiguous: some pairs
    // may be renames. One resolver round per kind decides.
    if !created.is_empty() && !deleted.is_empty() {
        debug!(
            kind = E::KIND.label(),
            created = created.len(),
            deleted = deleted.len(),
            "ambiguous create/delete candidates, consulting resolver"
        );

        let mut created_in: HashSet<EntityKey> = created.iter().map(|e| e.key()).collect();
        let mut deleted_in: HashSet<EntityKey> = deleted.iter().map(|e| e.key()).collect();

        let resolution = resolver
            .resolve(
                E::KIND,
                created.iter().cloned().map(E::into_entity).collect(),
                deleted.iter().cloned().map(E::into_entity).collect(),
            )
            .await;

        let claim = |set: &mut HashSet<EntityKey>, key: &EntityKey, side: &str| {
            if !set.remove(key) {
                panic!(
                    "inconsistent resolver partition for {}: '{}' is not an unclaimed {} candidate",
                    E::KIND,
                    key,
                    side
                );
            }
        };

        created = Vec::new();
        deleted = Vec::new();
        for (from, to) in resolution.renamed {
            let (from, to) = (downcast::<E>(from), downcast::<E>(to));
            claim(&mut deleted_in, &from.key(), "deleted");
            claim(&mut created_in, &to.key(), "created");
            renamed.push((from, to));
        }
        for entity in resolution.created {
            let entity = downcast::<E>(entity);
            claim(&mut created_in, &entity.key(), "created");
            created.push(entity);
        }
        for entity in resolution.deleted {
            let entity = downcast::<E>(entity);
            claim(&mut deleted_in, &entity.key(), "deleted");
            deleted.push(entity);
        }

        if !created_in.is_empty() || !deleted_in.is_empty() {
            panic!(
                "inconsistent resolver partition for {}: {} candidate(s) missing from the output",
                E::KIND,
                created_in.len() + deleted_in.len()
            );
        }
    }

    // Entities present in both stores with differing fields are alters.
    let mut altered: Vec<(E, E)> = Vec::new();
    for cur_entity in cur.iter() {
        if let Some(prev_entity) = prev.get(&cur_entity.key())
            && prev_entity != cur_entity
        {
            altered.push((prev_entity.clone(), cur_entity.clone()));
        }
    }

    // A renamed entity may have changed beyond its key.
    for (from, to) in &renamed {
        let mut moved = from.clone();
        moved.rename_to(&to.key());
        if moved != *to {
            altered.push((moved, to.clone()));
        }
    }

    KindChanges {
        created,
        deleted,
        renamed,
        altered,
    }
}

/// Rename the stored entity matching `from`'s key to `to`'s key.
fn rename_self<E: DdlEntity>(collection: &mut Collection<E>, from: &E, to: &E) {
    let from_key = from.key();
    let to_key = to.key();
    for entity in collection.iter_mut() {
        if entity.key() == from_key {
            entity.rename_to(&to_key);
            return;
        }
    }
}

/// Cascade a schema rename into every entity referencing it by name.
fn apply_schema_rename(prev: &mut DdlStore, from: &Schema, to: &Schema) {
    let old = from.name.as_str();
    let new = to.name.as_str();

    rename_self(&mut prev.schemas, from, to);
    for e in prev.enums.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.sequences.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.policies.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.tables.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.columns.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.views.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.indexes.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.checks.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.pks.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
    }
    for e in prev.fks.iter_mut() {
        if e.schema == old {
            e.schema = new.to_string();
        }
        if e.schema_to == old {
            e.schema_to = new.to_string();
        }
    }
}

/// Cascade an enum rename into column types.
fn apply_enum_rename(prev: &mut DdlStore, from: &EnumType, to: &EnumType) {
    rename_self(&mut prev.enums, from, to);
    for column in prev.columns.iter_mut() {
        if column.sql_type == from.name {
            column.sql_type = to.name.clone();
        }
    }
}

/// Cascade a role rename into policy role lists.
fn apply_role_rename(prev: &mut DdlStore, from: &Role, to: &Role) {
    rename_self(&mut prev.roles, from, to);
    for policy in prev.policies.iter_mut() {
        for role in policy.roles.iter_mut() {
            if *role == from.name {
                *role = to.name.clone();
            }
        }
    }
}

/// Cascade a table rename into every table-scoped entity and into
/// foreign keys referencing it.
fn apply_table_rename(prev: &mut DdlStore, from: &Table, to: &Table) {
    let matches = |schema: &str, table: &str| schema == from.schema && table == from.name;

    rename_self(&mut prev.tables, from, to);
    for e in prev.columns.iter_mut() {
        if matches(&e.schema, &e.table) {
            e.schema = to.schema.clone();
            e.table = to.name.clone();
        }
    }
    for e in prev.policies.iter_mut() {
        if matches(&e.schema, &e.table) {
            e.schema = to.schema.clone();
            e.table = to.name.clone();
        }
    }
    for e in prev.indexes.iter_mut() {
        if matches(&e.schema, &e.table) {
            e.schema = to.schema.clone();
            e.table = to.name.clone();
        }
    }
    for e in prev.checks.iter_mut() {
        if matches(&e.schema, &e.table) {
            e.schema = to.schema.clone();
            e.table = to.name.clone();
        }
    }
    for e in prev.pks.iter_mut() {
        if matches(&e.schema, &e.table) {
            e.schema = to.schema.clone();
            e.table = to.name.clone();
        }
    }
    for e in prev.fks.iter_mut() {
        if matches(&e.schema, &e.table) {
            e.schema = to.schema.clone();
            e.table = to.name.clone();
        }
        if e.schema_to == from.schema && e.table_to == from.name {
            e.schema_to = to.schema.clone();
            e.table_to = to.name.clone();
        }
    }
}

/// Cascade a column rename into indexes and key constraints.
fn apply_column_rename(prev: &mut DdlStore, from: &Column, to: &Column) {
    let in_table = |schema: &str, table: &str| schema == from.schema && table == from.table;

    rename_self(&mut prev.columns, from, to);
    for index in prev.indexes.iter_mut() {
        if in_table(&index.schema, &index.table) {
            for col in index.columns.iter_mut() {
                if !col.is_expression && col.value == from.name {
                    col.value = to.name.clone();
                }
            }
        }
    }
    for pk in prev.pks.iter_mut() {
        if in_table(&pk.schema, &pk.table) {
            for col in pk.columns.iter_mut() {
                if *col == from.name {
                    *col = to.name.clone();
                }
            }
        }
    }
    for fk in prev.fks.iter_mut() {
        if in_table(&fk.schema, &fk.table) {
            for col in fk.columns.iter_mut() {
                if *col == from.name {
                    *col = to.name.clone();
                }
            }
        }
        if fk.schema_to == from.schema && fk.table_to == from.table {
            for col in fk.columns_to.iter_mut() {
                if *col == from.name {
                    *col = to.name.clone();
                }
            }
        }
    }
}

/// Compute the diff between two stores.
///
/// `prev` and `cur` are not mutated; the engine works on a private copy
/// of `prev` so rename cascades never alias caller state. Statement
/// emission order: renames (kind order), drops (reverse kind order),
/// creates (kind order), alters (kind order).
pub async fn ddl_diff(
    prev: &DdlStore,
    cur: &DdlStore,
    resolver: &dyn RenameResolver,
    grammar: &dyn SqlGrammar,
) -> DiffResult {
    let mut prev = prev.clone();
    let mut renames: Vec<DdlChange> = Vec::new();
    let mut records: Vec<RenameRecord> = Vec::new();
    let mut erased: Vec<ErasedChanges> = Vec::with_capacity(KIND_ORDER.len());

    macro_rules! record_renames {
        ($changes:expr, $kind:expr) => {
            for (from, to) in &$changes.renamed {
                records.push(RenameRecord::new($kind, &from.key(), &to.key()));
                renames.push(DdlChange::Rename {
                    from: from.clone().into_entity(),
                    to: to.clone().into_entity(),
                });
            }
        };
    }

    let changes = diff_kind(&prev.schemas, &cur.schemas, resolver).await;
    record_renames!(changes, EntityKind::Schema);
    for (from, to) in changes.renamed.clone() {
        apply_schema_rename(&mut prev, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.enums, &cur.enums, resolver).await;
    record_renames!(changes, EntityKind::Enum);
    for (from, to) in changes.renamed.clone() {
        apply_enum_rename(&mut prev, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.sequences, &cur.sequences, resolver).await;
    record_renames!(changes, EntityKind::Sequence);
    for (from, to) in changes.renamed.clone() {
        rename_self(&mut prev.sequences, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.roles, &cur.roles, resolver).await;
    record_renames!(changes, EntityKind::Role);
    for (from, to) in changes.renamed.clone() {
        apply_role_rename(&mut prev, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.policies, &cur.policies, resolver).await;
    record_renames!(changes, EntityKind::Policy);
    for (from, to) in changes.renamed.clone() {
        rename_self(&mut prev.policies, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.tables, &cur.tables, resolver).await;
    record_renames!(changes, EntityKind::Table);
    for (from, to) in changes.renamed.clone() {
        apply_table_rename(&mut prev, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.columns, &cur.columns, resolver).await;
    record_renames!(changes, EntityKind::Column);
    for (from, to) in changes.renamed.clone() {
        apply_column_rename(&mut prev, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.views, &cur.views, resolver).await;
    record_renames!(changes, EntityKind::View);
    for (from, to) in changes.renamed.clone() {
        rename_self(&mut prev.views, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.indexes, &cur.indexes, resolver).await;
    record_renames!(changes, EntityKind::Index);
    for (from, to) in changes.renamed.clone() {
        rename_self(&mut prev.indexes, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.checks, &cur.checks, resolver).await;
    record_renames!(changes, EntityKind::Check);
    for (from, to) in changes.renamed.clone() {
        rename_self(&mut prev.checks, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.pks, &cur.pks, resolver).await;
    record_renames!(changes, EntityKind::PrimaryKey);
    for (from, to) in changes.renamed.clone() {
        rename_self(&mut prev.pks, &from, &to);
    }
    erased.push(changes.erase());

    let changes = diff_kind(&prev.fks, &cur.fks, resolver).await;
    record_renames!(changes, EntityKind::ForeignKey);
    for (from, to) in changes.renamed.clone() {
        rename_self(&mut prev.fks, &from, &to);
    }
    erased.push(changes.erase());

    assemble(renames, records, erased, cur, grammar)
}

/// Diff against an empty previous store: a pure-create export of the
/// current schema. The rename path is never reached.
pub async fn ddl_diff_dry(cur: &DdlStore, grammar: &dyn SqlGrammar) -> DiffResult {
    ddl_diff(&DdlStore::new(), cur, &NoRenameResolver, grammar).await
}

/// Assemble the phase-ordered change list and render statements.
fn assemble(
    renames: Vec<DdlChange>,
    records: Vec<RenameRecord>,
    erased: Vec<ErasedChanges>,
    cur: &DdlStore,
    grammar: &dyn SqlGrammar,
) -> DiffResult {
    let created_tables: HashSet<EntityKey> = erased
        .iter()
        .filter(|c| c.kind == EntityKind::Table)
        .flat_map(|c| c.created.iter().map(Entity::key))
        .collect();
    let dropped_tables: HashSet<EntityKey> = erased
        .iter()
        .filter(|c| c.kind == EntityKind::Table)
        .flat_map(|c| c.deleted.iter().map(Entity::key))
        .collect();
    let dropped_schemas: HashSet<String> = erased
        .iter()
        .filter(|c| c.kind == EntityKind::Schema)
        .flat_map(|c| c.deleted.iter().map(|e| e.key().name))
        .collect();

    let in_dropped_container = |entity: &Entity| {
        let key = entity.key();
        if entity.kind() != EntityKind::Schema
            && let Some(schema) = &key.schema
            && dropped_schemas.contains(schema)
        {
            return true;
        }
        if let (Some(schema), Some(table)) = (&key.schema, &key.table) {
            return dropped_tables.contains(&EntityKey::scoped(schema, table));
        }
        false
    };

    // Columns and primary keys of freshly created tables are inlined
    // into CREATE TABLE; a separate create would be redundant.
    let inlined_into_create = |entity: &Entity| {
        let key = entity.key();
        matches!(
            entity.kind(),
            EntityKind::Column | EntityKind::PrimaryKey
        ) && match (&key.schema, &key.table) {
            (Some(schema), Some(table)) => {
                created_tables.contains(&EntityKey::scoped(schema, table))
            }
            _ => false,
        }
    };

    let mut changes: Vec<DdlChange> = renames;

    // Drops, reverse kind order: dependents before containers.
    for set in erased.iter().rev() {
        for entity in &set.deleted {
            if in_dropped_container(entity) {
                continue;
            }
            changes.push(DdlChange::Drop(entity.clone()));
        }
    }

    // Creates, kind order: containers before dependents.
    for set in &erased {
        for entity in &set.created {
            if inlined_into_create(entity) {
                continue;
            }
            changes.push(DdlChange::Create(entity.clone()));
        }
    }

    // Alters, kind order.
    for set in &erased {
        for (from, to) in &set.altered {
            changes.push(DdlChange::Alter {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }

    let sql_statements = changes
        .iter()
        .flat_map(|change| grammar.render(change, cur))
        .collect();

    DiffResult {
        sql_statements,
        renames: records,
        changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{IndexColumn, PrimaryKey};
    use crate::postgres::PostgresGrammar;
    use crate::resolver::ScriptedResolver;
    use pretty_assertions::assert_eq;

    fn schema(name: &str) -> Schema {
        Schema {
            name: name.to_string(),
        }
    }

    fn table(name: &str) -> Table {
        Table {
            schema: "public".to_string(),
            name: name.to_string(),
            rls_enabled: false,
        }
    }

    fn column(table: &str, name: &str, sql_type: &str, not_null: bool) -> Column {
        Column {
            schema: "public".to_string(),
            table: table.to_string(),
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            dimensions: 0,
            not_null,
            default: None,
            generated: None,
            identity: None,
        }
    }

    fn users_store() -> DdlStore {
        let mut store = DdlStore::new();
        store.schemas.push(schema("public"));
        store.tables.push(table("users"));
        store.columns.push(column("users", "id", "integer", true));
        store.columns.push(column("users", "name", "text", true));
        store.pks.push(PrimaryKey {
            schema: "public".to_string(),
            table: "users".to_string(),
            name: "users_pkey".to_string(),
            columns: vec!["id".to_string()],
        });
        store
    }

    #[tokio::test]
    async fn test_diff_against_self_is_empty() {
        let store = users_store();
        let result = ddl_diff(&store, &store, &NoRenameResolver, &PostgresGrammar).await;

        assert!(result.is_empty());
        assert!(result.sql_statements.is_empty());
        assert!(result.renames.is_empty());
        assert_eq!(result.summary(), "No changes");
    }

    #[tokio::test]
    async fn test_round_trip_store_diffs_empty() {
        let store = users_store();
        let rebuilt = DdlStore::from_entities(store.entities()).unwrap();
        let result = ddl_diff(&store, &rebuilt, &NoRenameResolver, &PostgresGrammar).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_table_rename_cascades_into_columns() {
        let mut prev = DdlStore::new();
        prev.schemas.push(schema("public"));
        prev.tables.push(table("t1"));
        prev.columns.push(column("t1", "c1", "text", false));

        let mut cur = DdlStore::new();
        cur.schemas.push(schema("public"));
        cur.tables.push(table("t2"));
        cur.columns.push(column("t2", "c1", "text", false));

        let resolver = ScriptedResolver::new().rename(
            EntityKind::Table,
            EntityKey::scoped("public", "t1"),
            EntityKey::scoped("public", "t2"),
        );

        let result = ddl_diff(&prev, &cur, &resolver, &PostgresGrammar).await;

        // The cascade rewrites the column's table reference before the
        // column kind diffs, so the only change is the table rename.
        assert_eq!(result.renames.len(), 1);
        assert_eq!(result.renames[0].from, "public.t1");
        assert_eq!(result.renames[0].to, "public.t2");
        assert_eq!(result.changes.len(), 1);
        assert!(matches!(result.changes[0], DdlChange::Rename { .. }));
        assert_eq!(
            result.sql_statements,
            vec![r#"ALTER TABLE "public"."t1" RENAME TO "t2";"#]
        );
    }

    #[tokio::test]
    async fn test_ambiguous_tables_without_renames_drop_then_create() {
        let mut prev = DdlStore::new();
        prev.schemas.push(schema("public"));
        prev.tables.push(table("a"));
        prev.columns.push(column("a", "id", "integer", true));

        let mut cur = DdlStore::new();
        cur.schemas.push(schema("public"));
        cur.tables.push(table("b"));
        cur.columns.push(column("b", "id", "integer", true));

        let result = ddl_diff(&prev, &cur, &NoRenameResolver, &PostgresGrammar).await;

        assert!(result.renames.is_empty());
        let drop_pos = result
            .sql_statements
            .iter()
            .position(|s| s.contains(r#"DROP TABLE "public"."a""#))
            .expect("drop statement for a");
        let create_pos = result
            .sql_statements
            .iter()
            .position(|s| s.contains(r#"CREATE TABLE "public"."b""#))
            .expect("create statement for b");
        assert!(drop_pos < create_pos);

        // Column changes of dropped/created tables are folded into the
        // table statements.
        assert!(
            !result
                .sql_statements
                .iter()
                .any(|s| s.contains("ADD COLUMN") || s.contains("DROP COLUMN"))
        );
    }

    #[tokio::test]
    async fn test_dry_diff_creates_users_table() {
        let result = ddl_diff_dry(&users_store(), &PostgresGrammar).await;

        assert!(result.renames.is_empty());
        let create = result
            .sql_statements
            .iter()
            .find(|s| s.starts_with(r#"CREATE TABLE "public"."users""#))
            .expect("create table statement");
        assert!(create.contains(r#""id" integer NOT NULL"#));
        assert!(create.contains(r#""name" text NOT NULL"#));
        assert!(create.contains(r#"CONSTRAINT "users_pkey" PRIMARY KEY ("id")"#));
        assert!(
            result
                .sql_statements
                .iter()
                .any(|s| s.contains(r#"CREATE SCHEMA "public""#))
        );
    }

    #[tokio::test]
    async fn test_column_type_change_is_an_alter() {
        let prev = users_store();
        let mut cur = users_store();
        for c in cur.columns.iter_mut() {
            if c.name == "name" {
                c.sql_type = "varchar(255)".to_string();
            }
        }

        let result = ddl_diff(&prev, &cur, &NoRenameResolver, &PostgresGrammar).await;

        assert_eq!(result.changes.len(), 1);
        assert!(matches!(result.changes[0], DdlChange::Alter { .. }));
        assert_eq!(
            result.sql_statements,
            vec![
                r#"ALTER TABLE "public"."users" ALTER COLUMN "name" SET DATA TYPE varchar(255);"#
            ]
        );
    }

    #[tokio::test]
    async fn test_schema_rename_cascades_everywhere() {
        let prev = users_store();
        let mut cur = DdlStore::new();
        cur.schemas.push(schema("app"));
        let mut t = table("users");
        t.schema = "app".to_string();
        cur.tables.push(t);
        for name in [("id", "integer", true), ("name", "text", true)] {
            let mut c = column("users", name.0, name.1, name.2);
            c.schema = "app".to_string();
            cur.columns.push(c);
        }
        cur.pks.push(PrimaryKey {
            schema: "app".to_string(),
            table: "users".to_string(),
            name: "users_pkey".to_string(),
            columns: vec!["id".to_string()],
        });

        let resolver = ScriptedResolver::new().rename(
            EntityKind::Schema,
            EntityKey::name("public"),
            EntityKey::name("app"),
        );

        let result = ddl_diff(&prev, &cur, &resolver, &PostgresGrammar).await;

        assert_eq!(result.renames.len(), 1);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(
            result.sql_statements,
            vec![r#"ALTER SCHEMA "public" RENAME TO "app";"#]
        );
    }

    #[tokio::test]
    async fn test_column_rename_cascades_into_index() {
        let mut prev = users_store();
        prev.indexes.push(crate::entities::Index {
            schema: "public".to_string(),
            table: "users".to_string(),
            name: "users_name_idx".to_string(),
            columns: vec![IndexColumn::column("name")],
            unique: false,
            method: "btree".to_string(),
            where_clause: None,
        });

        let mut cur = prev.clone();
        for c in cur.columns.iter_mut() {
            if c.name == "name" {
                c.name = "full_name".to_string();
            }
        }
        for i in cur.indexes.iter_mut() {
            i.columns = vec![IndexColumn::column("full_name")];
        }

        let resolver = ScriptedResolver::new().rename(
            EntityKind::Column,
            EntityKey::table_scoped("public", "users", "name"),
            EntityKey::table_scoped("public", "users", "full_name"),
        );

        let result = ddl_diff(&prev, &cur, &resolver, &PostgresGrammar).await;

        assert_eq!(result.renames.len(), 1);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(
            result.sql_statements,
            vec![r#"ALTER TABLE "public"."users" RENAME COLUMN "name" TO "full_name";"#]
        );
    }

    #[tokio::test]
    #[should_panic(expected = "inconsistent resolver partition")]
    async fn test_inconsistent_partition_panics() {
        struct SwallowingResolver;

        #[async_trait::async_trait]
        impl RenameResolver for SwallowingResolver {
            async fn resolve(
                &self,
                _kind: EntityKind,
                created: Vec<Entity>,
                _deleted: Vec<Entity>,
            ) -> crate::resolver::Resolution {
                // Drops the deleted candidates on the floor.
                crate::resolver::Resolution {
                    renamed: Vec::new(),
                    created,
                    deleted: Vec::new(),
                }
            }
        }

        let mut prev = DdlStore::new();
        prev.tables.push(table("a"));
        let mut cur = DdlStore::new();
        cur.tables.push(table("b"));

        let _ = ddl_diff(&prev, &cur, &SwallowingResolver, &PostgresGrammar).await;
    }
}
