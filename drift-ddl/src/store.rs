//! The DDL store: a typed multi-entity table keyed by entity kind.
//!
//! One insertion-ordered collection per kind, conflict-aware insertion,
//! and composite-key queries. The store never throws on a key conflict;
//! it reports [`PushResult::Conflict`] and keeps the first entity, and
//! the caller decides how to surface it.

use crate::entities::{
    Check, Column, DdlEntity, Entity, EntityKey, EnumType, ForeignKey, Index, Policy, PrimaryKey,
    Role, Schema, Sequence, Table, View,
};
use crate::error::SchemaError;

/// Outcome of a [`Collection::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// The entity was inserted.
    Ok,
    /// An entity with an identical composite key already exists; the
    /// store was left untouched.
    Conflict,
}

impl PushResult {
    /// Whether this push was rejected.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Partial composite-key filter for [`Collection::one`] and
/// [`Collection::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    /// Schema name to match.
    pub schema: Option<String>,
    /// Table name to match.
    pub table: Option<String>,
    /// Entity name to match.
    pub name: Option<String>,
}

impl KeyFilter {
    /// Filter matching every entity of a kind.
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to a schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Restrict to a table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Restrict to an entity name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether a key satisfies this filter.
    pub fn matches(&self, key: &EntityKey) -> bool {
        if let Some(schema) = &self.schema
            && key.schema.as_deref() != Some(schema.as_str())
        {
            return false;
        }
        if let Some(table) = &self.table
            && key.table.as_deref() != Some(table.as_str())
        {
            return false;
        }
        if let Some(name) = &self.name
            && key.name != *name
        {
            return false;
        }
        true
    }
}

/// Insertion-ordered collection of one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<E: DdlEntity> {
    items: Vec<E>,
}

// Manual impl: the derive would demand `E: Default`, which entity
// records do not carry.
impl<E: DdlEntity> Default for Collection<E> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<E: DdlEntity> Collection<E> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Insert an entity, rejecting composite-key conflicts.
    pub fn push(&mut self, entity: E) -> PushResult {
        let key = entity.key();
        if self.items.iter().any(|e| e.key() == key) {
            return PushResult::Conflict;
        }
        self.items.push(entity);
        PushResult::Ok
    }

    /// Look up an entity by its exact composite key.
    pub fn get(&self, key: &EntityKey) -> Option<&E> {
        self.items.iter().find(|e| e.key() == *key)
    }

    /// The single entity matching a partial-key filter, or `None`.
    ///
    /// # Panics
    ///
    /// Panics when the filter matches more than one entity: an ambiguous
    /// `one` lookup means a store invariant has been violated.
    pub fn one(&self, filter: &KeyFilter) -> Option<&E> {
        let mut found = None;
        for entity in &self.items {
            if filter.matches(&entity.key()) {
                if let Some(prior) = found.replace(entity) {
                    panic!(
                        "ambiguous one() lookup for {}: filter {:?} matched both {} and {}",
                        E::KIND,
                        filter,
                        prior.key(),
                        entity.key(),
                    );
                }
            }
        }
        found
    }

    /// All entities matching a partial-key filter, insertion order.
    pub fn list(&self, filter: &KeyFilter) -> Vec<&E> {
        self.items
            .iter()
            .filter(|e| filter.matches(&e.key()))
            .collect()
    }

    /// Iterate over all entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.items.iter()
    }

    /// Mutable iteration, used by the diff engine's rename cascade on
    /// its private working copies.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.items.iter_mut()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<E: DdlEntity> FromIterator<E> for Collection<E> {
    /// Collects, keeping the first entity on key conflicts.
    fn from_iter<T: IntoIterator<Item = E>>(iter: T) -> Self {
        let mut collection = Self::new();
        for entity in iter {
            let _ = collection.push(entity);
        }
        collection
    }
}

/// A full DDL snapshot: one collection per entity kind.
///
/// Created empty, populated by interim conversion or by replaying a
/// persisted snapshot's entity list, and treated as immutable once
/// handed to the diff engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DdlStore {
    pub schemas: Collection<Schema>,
    pub enums: Collection<EnumType>,
    pub sequences: Collection<Sequence>,
    pub roles: Collection<Role>,
    pub policies: Collection<Policy>,
    pub tables: Collection<Table>,
    pub columns: Collection<Column>,
    pub views: Collection<View>,
    pub indexes: Collection<Index>,
    pub checks: Collection<Check>,
    pub pks: Collection<PrimaryKey>,
    pub fks: Collection<ForeignKey>,
}

impl DdlStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a kind-erased entity into its collection.
    pub fn push_entity(&mut self, entity: Entity) -> PushResult {
        match entity {
            Entity::Schema(e) => self.schemas.push(e),
            Entity::Enum(e) => self.enums.push(e),
            Entity::Sequence(e) => self.sequences.push(e),
            Entity::Role(e) => self.roles.push(e),
            Entity::Policy(e) => self.policies.push(e),
            Entity::Table(e) => self.tables.push(e),
            Entity::Column(e) => self.columns.push(e),
            Entity::View(e) => self.views.push(e),
            Entity::Index(e) => self.indexes.push(e),
            Entity::Check(e) => self.checks.push(e),
            Entity::PrimaryKey(e) => self.pks.push(e),
            Entity::ForeignKey(e) => self.fks.push(e),
        }
    }

    /// Kind-erased view over every entity, kind order then insertion
    /// order. This is the snapshot `ddl` array.
    pub fn entities(&self) -> Vec<Entity> {
        let mut out = Vec::new();
        out.extend(self.schemas.iter().cloned().map(Entity::Schema));
        out.extend(self.enums.iter().cloned().map(Entity::Enum));
        out.extend(self.sequences.iter().cloned().map(Entity::Sequence));
        out.extend(self.roles.iter().cloned().map(Entity::Role));
        out.extend(self.policies.iter().cloned().map(Entity::Policy));
        out.extend(self.tables.iter().cloned().map(Entity::Table));
        out.extend(self.columns.iter().cloned().map(Entity::Column));
        out.extend(self.views.iter().cloned().map(Entity::View));
        out.extend(self.indexes.iter().cloned().map(Entity::Index));
        out.extend(self.checks.iter().cloned().map(Entity::Check));
        out.extend(self.pks.iter().cloned().map(Entity::PrimaryKey));
        out.extend(self.fks.iter().cloned().map(Entity::ForeignKey));
        out
    }

    /// Rebuild a store from a persisted entity list. Key conflicts are
    /// converted to [`SchemaError::Duplicate`] and collected in batch.
    pub fn from_entities(
        entities: impl IntoIterator<Item = Entity>,
    ) -> Result<Self, Vec<SchemaError>> {
        let mut store = Self::new();
        let mut errors = Vec::new();

        for entity in entities {
            let kind = entity.kind();
            let key = entity.key();
            if store.push_entity(entity).is_conflict() {
                let scope = match (&key.schema, &key.table) {
                    (Some(s), Some(t)) => format!("{}.{}", s, t),
                    (Some(s), None) => s.clone(),
                    _ => "database".to_string(),
                };
                errors.push(SchemaError::duplicate(kind, key.name, scope));
            }
        }

        if errors.is_empty() {
            Ok(store)
        } else {
            Err(errors)
        }
    }

    /// Shape-validate every entity in the store.
    ///
    /// # Panics
    ///
    /// Panics on the first failing entity. A failure here is a
    /// programming-invariant violation, not a recoverable user error.
    pub fn validate(&self) {
        for entity in self.entities() {
            if let Err(reason) = entity.validate() {
                panic!(
                    "invalid {} entity '{}': {}",
                    entity.kind(),
                    entity.key(),
                    reason
                );
            }
        }
    }

    /// Total entity count across every kind.
    pub fn len(&self) -> usize {
        self.schemas.len()
            + self.enums.len()
            + self.sequences.len()
            + self.roles.len()
            + self.policies.len()
            + self.tables.len()
            + self.columns.len()
            + self.views.len()
            + self.indexes.len()
            + self.checks.len()
            + self.pks.len()
            + self.fks.len()
    }

    /// Whether the store holds no entities at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityKind;

    fn table(schema: &str, name: &str) -> Table {
        Table {
            schema: schema.to_string(),
            name: name.to_string(),
            rls_enabled: false,
        }
    }

    fn column(table_name: &str, name: &str, sql_type: &str) -> Column {
        Column {
            schema: "public".to_string(),
            table: table_name.to_string(),
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            dimensions: 0,
            not_null: false,
            default: None,
            generated: None,
            identity: None,
        }
    }

    #[test]
    fn test_default_store_is_empty_for_every_kind() {
        // Entity records have no Default impls, so empty collections must
        // not require one.
        let store = DdlStore::default();
        assert!(store.is_empty());
        assert!(Collection::<ForeignKey>::default().is_empty());
        assert!(Collection::<Policy>::default().is_empty());
    }

    #[test]
    fn test_push_conflict_keeps_first() {
        let mut store = DdlStore::new();
        let mut first = column("users", "id", "integer");
        first.not_null = true;
        let second = column("users", "id", "bigint");

        assert_eq!(store.columns.push(first), PushResult::Ok);
        assert_eq!(store.columns.push(second), PushResult::Conflict);
        assert_eq!(store.columns.len(), 1);

        let kept = store
            .columns
            .get(&EntityKey::table_scoped("public", "users", "id"))
            .unwrap();
        assert_eq!(kept.sql_type, "integer");
        assert!(kept.not_null);
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let mut store = DdlStore::new();
        for name in ["id", "email", "name"] {
            store.columns.push(column("users", name, "text"));
        }
        store.columns.push(column("posts", "id", "integer"));

        let names: Vec<&str> = store
            .columns
            .list(&KeyFilter::any().table("users"))
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "email", "name"]);
    }

    #[test]
    fn test_one_returns_single_match() {
        let mut store = DdlStore::new();
        store.tables.push(table("public", "users"));
        store.tables.push(table("auth", "users"));

        let found = store
            .tables
            .one(&KeyFilter::any().schema("public").name("users"));
        assert_eq!(found.unwrap().schema, "public");

        assert!(
            store
                .tables
                .one(&KeyFilter::any().name("missing"))
                .is_none()
        );
    }

    #[test]
    #[should_panic(expected = "ambiguous")]
    fn test_one_panics_on_ambiguity() {
        let mut store = DdlStore::new();
        store.tables.push(table("public", "users"));
        store.tables.push(table("auth", "users"));
        let _ = store.tables.one(&KeyFilter::any().name("users"));
    }

    #[test]
    fn test_entities_round_trip() {
        let mut store = DdlStore::new();
        store.schemas.push(Schema {
            name: "public".to_string(),
        });
        store.tables.push(table("public", "users"));
        store.columns.push(column("users", "id", "integer"));

        let rebuilt = DdlStore::from_entities(store.entities()).unwrap();
        assert_eq!(rebuilt, store);
    }

    #[test]
    fn test_from_entities_collects_duplicates() {
        let entities = vec![
            Entity::Table(table("public", "users")),
            Entity::Table(table("public", "users")),
            Entity::Column(column("users", "id", "integer")),
            Entity::Column(column("users", "id", "integer")),
        ];

        let errors = DdlStore::from_entities(entities).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0],
            SchemaError::duplicate(EntityKind::Table, "users", "public")
        );
        assert_eq!(
            errors[1],
            SchemaError::duplicate(EntityKind::Column, "id", "public.users")
        );
    }
}
