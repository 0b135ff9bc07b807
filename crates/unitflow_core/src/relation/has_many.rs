//! One-to-many and one-to-one relations owned by the parent.

use super::{Relation, RelationStatus, Scope};
use crate::error::{CoreError, CoreResult};
use crate::heap::{EntityId, Related};
use crate::transaction::Task;
use tracing::trace;
use unitflow_storage::Value;

/// The children carry a foreign key (`outer_key`) to the parent's
/// `inner_key`.
///
/// Storing the parent stores its children after it and pushes the parent key
/// into them. Deleting the parent deletes (`cascade`), detaches (`nullable`)
/// or is blocked by its children.
#[derive(Debug, Clone)]
pub struct HasMany {
    name: String,
    target: String,
    inner_key: String,
    outer_key: String,
    nullable: bool,
    cascade: bool,
    inverse: String,
}

impl HasMany {
    /// Creates a cascading, non-nullable relation.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            inverse: name.clone(),
            name,
            target: target.into(),
            inner_key: inner_key.into(),
            outer_key: outer_key.into(),
            nullable: false,
            cascade: true,
        }
    }

    /// Allows children to survive without a parent.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets whether children follow the parent's task.
    #[must_use]
    pub fn cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    /// Returns the parent's key field.
    #[must_use]
    pub fn inner_key(&self) -> &str {
        &self.inner_key
    }

    /// Returns the children's foreign key field.
    #[must_use]
    pub fn outer_key(&self) -> &str {
        &self.outer_key
    }

    /// Returns the name of the inverse relation registered on the child role.
    #[must_use]
    pub fn inverse(&self) -> &str {
        &self.inverse
    }

    pub(crate) fn set_inverse(&mut self, inverse: impl Into<String>) {
        self.inverse = inverse.into();
    }

    fn children(&self, scope: &Scope<'_>, entity: EntityId) -> Vec<EntityId> {
        scope
            .state(entity)
            .and_then(|s| s.relation(&self.name))
            .map(Related::ids)
            .unwrap_or_default()
    }

    fn prepare_store(
        &self,
        scope: &mut Scope<'_>,
        entity: EntityId,
        current: Vec<EntityId>,
    ) -> CoreResult<()> {
        let original = scope
            .persisted_relation(entity, &self.name)
            .map(|r| r.ids())
            .unwrap_or_default();

        // Deleted children drop out of the collection.
        let current: Vec<_> = current
            .into_iter()
            .filter(|child| !scope.is_removed(*child))
            .collect();
        for child in &current {
            scope.attach_store(*child, self.cascade)?;
            let state = scope.state_mut(*child)?;
            state.wait(&self.outer_key);
            state.set_relation_status(&self.inverse, RelationStatus::Process);
        }

        for removed in original.into_iter().filter(|id| !current.contains(id)) {
            if !scope.heap().contains(removed) || scope.is_removed(removed) {
                continue;
            }
            if self.nullable {
                self.detach(scope, removed)?;
            } else {
                trace!(relation = %self.name, child = %removed, "orphan scheduled for deletion");
                scope.attach_delete(removed, false, self.cascade)?;
            }
        }

        let state = scope.state_mut(entity)?;
        state.set_relation(&self.name, Related::Many(current));
        state.set_relation_status(&self.name, RelationStatus::Process);
        self.queue(scope, entity)
    }

    fn prepare_delete(
        &self,
        scope: &mut Scope<'_>,
        entity: EntityId,
        children: Vec<EntityId>,
        force: bool,
    ) -> CoreResult<()> {
        for child in &children {
            if self.cascade {
                scope.attach_delete(*child, force, true)?;
            } else if self.nullable {
                self.detach(scope, *child)?;
            }
        }

        let state = scope.state_mut(entity)?;
        state.set_relation(&self.name, Related::Many(children));
        state.set_relation_status(&self.name, RelationStatus::Process);
        self.queue(scope, entity)
    }

    fn detach(&self, scope: &mut Scope<'_>, child: EntityId) -> CoreResult<()> {
        if scope.is_removed(child) {
            return Ok(());
        }
        scope.attach_store(child, false)?;
        let state = scope.state_mut(child)?;
        state.register(&self.outer_key, Value::Null);
        state.set_relation_status(&self.inverse, RelationStatus::Resolved);
        Ok(())
    }

    fn check_shape(&self, scope: &Scope<'_>, entity: EntityId, related: &Related, single: bool) -> CoreResult<()> {
        if matches!(related, Related::Many(_)) == single {
            let expected = if single { "a single reference" } else { "a collection" };
            return Err(CoreError::invalid_relation(
                scope.role_of(entity)?,
                &self.name,
                format!("expected {expected}"),
            ));
        }
        Ok(())
    }

    fn prepare_with(
        &self,
        scope: &mut Scope<'_>,
        entity: EntityId,
        related: Option<&Related>,
        single: bool,
    ) -> CoreResult<()> {
        let Some(related) = related else {
            return scope.set_relation_status(entity, &self.name, RelationStatus::Resolved);
        };
        self.check_shape(scope, entity, related, single)?;

        match scope.task(entity) {
            Some(Task::Store) | None => self.prepare_store(scope, entity, related.ids()),
            Some(task) => self.prepare_delete(scope, entity, related.ids(), task == Task::ForceDelete),
        }
    }
}

impl Relation for HasMany {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn is_cascade(&self) -> bool {
        self.cascade
    }

    fn prepare(
        &self,
        scope: &mut Scope<'_>,
        entity: EntityId,
        related: Option<&Related>,
        _has_changes: bool,
    ) -> CoreResult<()> {
        self.prepare_with(scope, entity, related, false)
    }

    fn queue(&self, scope: &mut Scope<'_>, entity: EntityId) -> CoreResult<()> {
        let children = self.children(scope, entity);

        if scope.task(entity).is_some_and(Task::is_delete) {
            let blocked = children
                .iter()
                .filter(|child| scope.heap().contains(**child))
                .any(|child| !scope.is_processed(*child));
            let status = if blocked {
                RelationStatus::Process
            } else {
                RelationStatus::Resolved
            };
            return scope.set_relation_status(entity, &self.name, status);
        }

        let Some(key) = scope.key(entity, &self.inner_key) else {
            return scope.set_relation_status(entity, &self.name, RelationStatus::Process);
        };
        for child in children {
            if scope.is_processed(child) {
                continue;
            }
            let state = scope.state_mut(child)?;
            state.register(&self.outer_key, key.clone());
            state.set_relation_status(&self.inverse, RelationStatus::Resolved);
        }
        scope.set_relation_status(entity, &self.name, RelationStatus::Resolved)
    }
}

/// One-to-one variant of [`HasMany`]: the relation value is a single
/// reference.
#[derive(Debug, Clone)]
pub struct HasOne {
    inner: HasMany,
}

impl HasOne {
    /// Creates a cascading, non-nullable relation.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self {
            inner: HasMany::new(name, target, inner_key, outer_key),
        }
    }

    /// Allows the child to survive without a parent.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.inner = self.inner.nullable(nullable);
        self
    }

    /// Sets whether the child follows the parent's task.
    #[must_use]
    pub fn cascade(mut self, cascade: bool) -> Self {
        self.inner = self.inner.cascade(cascade);
        self
    }

    /// Returns the child's foreign key field.
    #[must_use]
    pub fn outer_key(&self) -> &str {
        self.inner.outer_key()
    }

    /// Returns the name of the inverse relation registered on the child role.
    #[must_use]
    pub fn inverse(&self) -> &str {
        self.inner.inverse()
    }

    pub(crate) fn set_inverse(&mut self, inverse: impl Into<String>) {
        self.inner.set_inverse(inverse);
    }
}

impl Relation for HasOne {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn target(&self) -> &str {
        self.inner.target()
    }

    fn is_cascade(&self) -> bool {
        self.inner.is_cascade()
    }

    fn prepare(
        &self,
        scope: &mut Scope<'_>,
        entity: EntityId,
        related: Option<&Related>,
        _has_changes: bool,
    ) -> CoreResult<()> {
        self.inner.prepare_with(scope, entity, related, true)
    }

    fn queue(&self, scope: &mut Scope<'_>, entity: EntityId) -> CoreResult<()> {
        self.inner.queue(scope, entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{Entity, Heap, NodeStatus};
    use crate::mapper::TableMapper;
    use crate::registry::Registry;
    use crate::transaction::Pool;
    use std::sync::Arc;
    use unitflow_storage::InMemoryDatabase;

    fn registry() -> Registry {
        let db = Arc::new(InMemoryDatabase::new("default"));
        let mut registry = Registry::new();
        registry
            .register(TableMapper::new("user", "users", "id", db.clone()).columns(["name"]))
            .register(TableMapper::new("post", "posts", "id", db).columns(["title", "user_id"]));
        registry
    }

    fn posts() -> HasMany {
        HasMany::new("posts", "post", "id", "user_id")
    }

    #[test]
    fn new_parent_connects_children_and_waits() {
        let registry = registry();
        let mut heap = Heap::new();
        let mut pool = Pool::new();
        let a = heap.insert(Entity::new("post"));
        let b = heap.insert(Entity::new("post"));
        let user = heap.insert(Entity::new("user").with_many("posts", vec![a, b]));
        let related = Related::Many(vec![a, b]);

        let mut scope = Scope::new(&mut pool, &mut heap, &registry);
        scope.attach_store(user, true).unwrap();
        posts().prepare(&mut scope, user, Some(&related), true).unwrap();

        assert_eq!(heap.state(user).unwrap().relation_status("posts"), RelationStatus::Process);
        for child in [a, b] {
            assert_eq!(pool.get(child).map(|t| t.task()), Some(Task::Store));
            let state = heap.state(child).unwrap();
            assert!(state.is_waiting("user_id"));
            assert_eq!(state.relation_status("posts"), RelationStatus::Process);
        }
    }

    #[test]
    fn stored_parent_pushes_its_key() {
        let registry = registry();
        let mut heap = Heap::new();
        let mut pool = Pool::new();
        let child = heap.insert(Entity::new("post"));
        let user = heap.attach_managed(Entity::new("user").with("id", 3));
        let related = Related::Many(vec![child]);

        let mut scope = Scope::new(&mut pool, &mut heap, &registry);
        scope.attach_store(user, true).unwrap();
        posts().prepare(&mut scope, user, Some(&related), true).unwrap();

        assert_eq!(heap.state(user).unwrap().relation_status("posts"), RelationStatus::Resolved);
        let state = heap.state(child).unwrap();
        assert_eq!(state.get("user_id"), Some(&Value::Int(3)));
        assert_eq!(state.relation_status("posts"), RelationStatus::Resolved);
    }

    #[test]
    fn delete_detaches_nullable_children() {
        let registry = registry();
        let mut heap = Heap::new();
        let mut pool = Pool::new();
        let child = heap.attach_managed(Entity::new("post").with("id", 1).with("user_id", 3));
        let user = heap.attach_managed(Entity::new("user").with("id", 3));
        let related = Related::Many(vec![child]);
        let relation = posts().cascade(false).nullable(true);

        let mut scope = Scope::new(&mut pool, &mut heap, &registry);
        scope.attach_delete(user, false, true).unwrap();
        relation.prepare(&mut scope, user, Some(&related), false).unwrap();

        assert_eq!(pool.get(child).map(|t| t.task()), Some(Task::Store));
        assert_eq!(heap.state(child).unwrap().get("user_id"), Some(&Value::Null));
        assert_eq!(heap.state(user).unwrap().relation_status("posts"), RelationStatus::Process);
    }

    #[test]
    fn deleted_child_drops_out_of_collection() {
        let registry = registry();
        let mut heap = Heap::new();
        let mut pool = Pool::new();
        let gone = heap.attach_managed(Entity::new("post").with("id", 1).with("user_id", 3));
        heap.node_mut(gone)
            .unwrap()
            .get_or_init_state()
            .set_status(NodeStatus::Deleted);
        heap.sync_state(gone);
        let kept = heap.insert(Entity::new("post"));
        let user = heap.attach_managed(Entity::new("user").with("id", 3));
        let related = Related::Many(vec![gone, kept]);

        let mut scope = Scope::new(&mut pool, &mut heap, &registry);
        scope.attach_store(user, true).unwrap();
        posts().prepare(&mut scope, user, Some(&related), true).unwrap();

        assert!(pool.get(gone).is_none());
        assert_eq!(pool.get(kept).map(|t| t.task()), Some(Task::Store));
        assert_eq!(
            heap.state(user).unwrap().relation("posts"),
            Some(&Related::Many(vec![kept]))
        );
    }

    #[test]
    fn has_one_rejects_collections() {
        let registry = registry();
        let mut heap = Heap::new();
        let mut pool = Pool::new();
        let user = heap.insert(Entity::new("user"));
        let related = Related::Many(vec![]);

        let mut scope = Scope::new(&mut pool, &mut heap, &registry);
        scope.attach_store(user, true).unwrap();
        let err = HasOne::new("profile", "post", "id", "user_id")
            .prepare(&mut scope, user, Some(&related), true)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRelation { .. }));
    }
}
