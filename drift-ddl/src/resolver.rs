//! Rename resolution protocol.
//!
//! When a diff finds both created and deleted candidates for one entity
//! kind, the situation is ambiguous: it may be independent creates and
//! drops, or some pairs may be renames. The engine asks an injected
//! [`RenameResolver`] exactly once per kind to partition the candidates.
//! Interactive implementations prompt a human; [`NoRenameResolver`] is
//! the conservative headless default that never infers renames.

use async_trait::async_trait;

use crate::entities::{Entity, EntityKey, EntityKind};

/// Three-way partition of rename candidates.
///
/// Every entity passed to the resolver must appear in exactly one bucket:
/// as the `from` or `to` side of a rename, or unchanged in `created` /
/// `deleted`. The engine verifies this and treats a violation as fatal.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Confirmed renames as `(from, to)` pairs; `from` comes from the
    /// deleted candidates, `to` from the created ones.
    pub renamed: Vec<(Entity, Entity)>,
    /// Candidates confirmed as genuine creates.
    pub created: Vec<Entity>,
    /// Candidates confirmed as genuine drops.
    pub deleted: Vec<Entity>,
}

/// Strategy interface consulted by the diff engine.
#[async_trait]
pub trait RenameResolver: Send + Sync {
    /// Partition ambiguous created/deleted candidates for one kind.
    ///
    /// Called at most once per entity kind per diff run, and only when
    /// both candidate lists are non-empty.
    async fn resolve(
        &self,
        kind: EntityKind,
        created: Vec<Entity>,
        deleted: Vec<Entity>,
    ) -> Resolution;
}

/// The automatic resolver: never infers a rename.
///
/// A wrong rename guess is more destructive than a drop-and-recreate, so
/// headless runs treat every ambiguity as independent creates and drops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenameResolver;

#[async_trait]
impl RenameResolver for NoRenameResolver {
    async fn resolve(
        &self,
        _kind: EntityKind,
        created: Vec<Entity>,
        deleted: Vec<Entity>,
    ) -> Resolution {
        Resolution {
            renamed: Vec::new(),
            created,
            deleted,
        }
    }
}

/// A resolver scripted with explicit `from -> to` key pairs, for
/// headless runs and tests that need confirmed renames.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResolver {
    renames: Vec<(EntityKind, EntityKey, EntityKey)>,
}

impl ScriptedResolver {
    /// Create an empty scripted resolver (equivalent to
    /// [`NoRenameResolver`]).
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a rename of `from` to `to` for a kind.
    pub fn rename(mut self, kind: EntityKind, from: EntityKey, to: EntityKey) -> Self {
        self.renames.push((kind, from, to));
        self
    }
}

#[async_trait]
impl RenameResolver for ScriptedResolver {
    async fn resolve(
        &self,
        kind: EntityKind,
        created: Vec<Entity>,
        deleted: Vec<Entity>,
    ) -> Resolution {
        let mut resolution = Resolution::default();
        let mut created: Vec<Option<Entity>> = created.into_iter().map(Some).collect();
        let mut deleted: Vec<Option<Entity>> = deleted.into_iter().map(Some).collect();

        for (scripted_kind, from, to) in &self.renames {
            if *scripted_kind != kind {
                continue;
            }
            let from_slot = deleted
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|e| e.key() == *from));
            let Some(from_slot) = from_slot else { continue };
            let to_slot = created
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|e| e.key() == *to));
            let Some(to_slot) = to_slot else { continue };

            let Some(from_entity) = from_slot.take() else {
                continue;
            };
            let Some(to_entity) = to_slot.take() else {
                continue;
            };
            resolution.renamed.push((from_entity, to_entity));
        }

        resolution.created.extend(created.into_iter().flatten());
        resolution.deleted.extend(deleted.into_iter().flatten());
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Table;

    fn table_entity(name: &str) -> Entity {
        Entity::Table(Table {
            schema: "public".to_string(),
            name: name.to_string(),
            rls_enabled: false,
        })
    }

    #[tokio::test]
    async fn test_no_rename_resolver_passes_through() {
        let resolution = NoRenameResolver
            .resolve(
                EntityKind::Table,
                vec![table_entity("b")],
                vec![table_entity("a")],
            )
            .await;

        assert!(resolution.renamed.is_empty());
        assert_eq!(resolution.created.len(), 1);
        assert_eq!(resolution.deleted.len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_resolver_pairs_renames() {
        let resolver = ScriptedResolver::new().rename(
            EntityKind::Table,
            EntityKey::scoped("public", "a"),
            EntityKey::scoped("public", "b"),
        );

        let resolution = resolver
            .resolve(
                EntityKind::Table,
                vec![table_entity("b"), table_entity("c")],
                vec![table_entity("a")],
            )
            .await;

        assert_eq!(resolution.renamed.len(), 1);
        assert_eq!(resolution.renamed[0].0.key().name, "a");
        assert_eq!(resolution.renamed[0].1.key().name, "b");
        assert_eq!(resolution.created.len(), 1);
        assert_eq!(resolution.created[0].key().name, "c");
        assert!(resolution.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_resolver_ignores_other_kinds() {
        let resolver = ScriptedResolver::new().rename(
            EntityKind::View,
            EntityKey::scoped("public", "a"),
            EntityKey::scoped("public", "b"),
        );

        let resolution = resolver
            .resolve(
                EntityKind::Table,
                vec![table_entity("b")],
                vec![table_entity("a")],
            )
            .await;

        assert!(resolution.renamed.is_empty());
        assert_eq!(resolution.created.len(), 1);
        assert_eq!(resolution.deleted.len(), 1);
    }
}
