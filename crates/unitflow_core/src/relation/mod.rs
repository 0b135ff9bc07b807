//! Relation resolvers.
//!
//! A relation resolver advances one relation of one entity towards being
//! written. The unit of work treats every relation kind the same way: it calls
//! [`Relation::prepare`] the first time and [`Relation::queue`] afterwards, and
//! reads back a [`RelationStatus`] from the entity's state.
//!
//! Resolvers registered as *masters* must resolve before their entity can be
//! stored; resolvers registered as *slaves* must resolve before their entity
//! can be deleted. Either set is also walked for cascading records.

mod belongs_to;
mod embedded;
mod has_many;
mod shadow;

pub use belongs_to::BelongsTo;
pub use embedded::Embedded;
pub use has_many::{HasMany, HasOne};
pub use shadow::ShadowBelongsTo;

use crate::error::{CoreError, CoreResult};
use crate::heap::{EntityId, Heap, NodeStatus, Related, State};
use crate::registry::Registry;
use crate::transaction::{Pool, Task, TaskStatus};
use std::fmt;
use unitflow_storage::Value;

/// Resolution status of one relation of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationStatus {
    /// Not attempted yet.
    Prepare,
    /// Attempted, blocked on another record.
    Process,
    /// In progress; the owner may be written now and revisited later.
    Deferred,
    /// Done.
    Resolved,
}

impl RelationStatus {
    /// Returns true when the owning record may be written.
    #[must_use]
    pub const fn allows_write(self) -> bool {
        matches!(self, Self::Deferred | Self::Resolved)
    }
}

/// Capability contract of a relation kind.
pub trait Relation: fmt::Debug + Send + Sync {
    /// Relation name, unique within the owning role.
    fn name(&self) -> &str;

    /// Role of the related entities.
    fn target(&self) -> &str;

    /// Whether related entities are scheduled along with the owner.
    fn is_cascade(&self) -> bool;

    /// First resolution attempt.
    ///
    /// `related` is the relation value fetched from the entity (`None` when
    /// not loaded); `has_changes` tells whether it differs from the persisted
    /// relation snapshot. Implementations may attach related entities to the
    /// pool and must leave a status in the owner's state.
    ///
    /// # Errors
    ///
    /// Returns an error when the relation value is invalid, e.g. a required
    /// relation was cleared.
    fn prepare(
        &self,
        scope: &mut Scope<'_>,
        entity: EntityId,
        related: Option<&Related>,
        has_changes: bool,
    ) -> CoreResult<()>;

    /// Follow-up resolution attempt.
    ///
    /// # Errors
    ///
    /// Returns an error when the heap lost track of a related entity.
    fn queue(&self, scope: &mut Scope<'_>, entity: EntityId) -> CoreResult<()>;
}

/// What a resolver can see and touch while it runs: the pool, the heap and
/// the registry of the running unit of work.
pub struct Scope<'a> {
    pool: &'a mut Pool,
    heap: &'a mut Heap,
    registry: &'a Registry,
}

impl<'a> Scope<'a> {
    /// Creates a scope.
    pub fn new(pool: &'a mut Pool, heap: &'a mut Heap, registry: &'a Registry) -> Self {
        Self {
            pool,
            heap,
            registry,
        }
    }

    /// Returns the pool.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &*self.pool
    }

    pub(crate) fn pool_mut(&mut self) -> &mut Pool {
        &mut *self.pool
    }

    /// Returns the heap.
    #[must_use]
    pub fn heap(&self) -> &Heap {
        &*self.heap
    }

    /// Returns the heap mutably.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Returns the role of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity.
    pub fn role_of(&self, entity: EntityId) -> CoreResult<String> {
        self.heap
            .node(entity)
            .map(|n| n.role().to_string())
            .ok_or_else(|| CoreError::entity_not_found(entity))
    }

    /// Returns the state of an entity, creating it from the persisted
    /// snapshot and the entity's current fields when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity or its role has
    /// no mapper.
    pub fn state_mut(&mut self, entity: EntityId) -> CoreResult<&mut State> {
        if self.heap.state(entity).is_none() {
            let extracted = {
                let e = self
                    .heap
                    .entity(entity)
                    .ok_or_else(|| CoreError::entity_not_found(entity))?;
                self.registry.extract(e)?
            };
            let node = self
                .heap
                .node_mut(entity)
                .ok_or_else(|| CoreError::entity_not_found(entity))?;
            node.get_or_init_state().overlay(extracted);
        }
        self.heap.require_state(entity)
    }

    /// Returns the state of an entity, if one exists.
    #[must_use]
    pub fn state(&self, entity: EntityId) -> Option<&State> {
        self.heap.state(entity)
    }

    /// Returns the task scheduled for an entity.
    #[must_use]
    pub fn task(&self, entity: EntityId) -> Option<Task> {
        self.pool.get(entity).map(|t| t.task())
    }

    /// Returns the scheduling status of an entity.
    #[must_use]
    pub fn status(&self, entity: EntityId) -> Option<TaskStatus> {
        self.pool.get(entity).map(|t| t.status())
    }

    /// Returns true once the entity's record is processed.
    #[must_use]
    pub fn is_processed(&self, entity: EntityId) -> bool {
        self.status(entity) == Some(TaskStatus::Processed)
    }

    /// Returns true once the entity is deleted from the store or its delete
    /// was written in the running unit of work.
    #[must_use]
    pub fn is_removed(&self, entity: EntityId) -> bool {
        let status = match self.heap.node(entity) {
            Some(node) => node.state().map_or(node.status(), State::status),
            None => return false,
        };
        matches!(status, NodeStatus::ScheduledDelete | NodeStatus::Deleted)
    }

    /// Schedules an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity, or if a deleted
    /// entity is scheduled for storing.
    pub fn attach(&mut self, entity: EntityId, task: Task, cascade: bool) -> CoreResult<()> {
        self.state_mut(entity)?;
        let role = self.role_of(entity)?;
        if task == Task::Store && self.is_removed(entity) {
            return Err(CoreError::invalid_operation(format!(
                "{role} {entity} is deleted and cannot be stored"
            )));
        }
        self.pool.attach(entity, &role, task, cascade, None);
        Ok(())
    }

    /// Schedules an entity for storing.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity.
    pub fn attach_store(&mut self, entity: EntityId, cascade: bool) -> CoreResult<()> {
        self.attach(entity, Task::Store, cascade)
    }

    /// Schedules an entity for deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity.
    pub fn attach_delete(&mut self, entity: EntityId, force: bool, cascade: bool) -> CoreResult<()> {
        let task = if force { Task::ForceDelete } else { Task::Delete };
        self.attach(entity, task, cascade)
    }

    /// Returns the value of `field` once the entity's row exists in the
    /// store, `None` while it still has to be inserted.
    #[must_use]
    pub fn key(&self, entity: EntityId, field: &str) -> Option<Value> {
        let node = self.heap.node(entity)?;
        match node.state() {
            Some(state) if state.status() == NodeStatus::New => None,
            Some(state) => state.get(field).filter(|v| !v.is_null()).cloned(),
            None if node.status() == NodeStatus::Managed => {
                node.data().get(field).filter(|v| !v.is_null()).cloned()
            }
            None => None,
        }
    }

    /// Returns the status of a relation of an entity.
    #[must_use]
    pub fn relation_status(&self, entity: EntityId, relation: &str) -> RelationStatus {
        self.heap
            .state(entity)
            .map_or(RelationStatus::Prepare, |s| s.relation_status(relation))
    }

    /// Sets the status of a relation of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap doesn't know the entity.
    pub fn set_relation_status(
        &mut self,
        entity: EntityId,
        relation: &str,
        status: RelationStatus,
    ) -> CoreResult<()> {
        self.state_mut(entity)?.set_relation_status(relation, status);
        Ok(())
    }

    /// Returns true when `related` differs from the persisted relation value.
    #[must_use]
    pub fn relation_changed(
        &self,
        entity: EntityId,
        relation: &str,
        related: Option<&Related>,
    ) -> bool {
        self.heap
            .node(entity)
            .map_or(true, |n| n.relations().get(relation) != related)
    }

    /// Returns the persisted value of a relation.
    #[must_use]
    pub fn persisted_relation(&self, entity: EntityId, relation: &str) -> Option<Related> {
        self.heap
            .node(entity)
            .and_then(|n| n.relations().get(relation).cloned())
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("pool", &self.pool.count())
            .field("heap", &self.heap.len())
            .finish_non_exhaustive()
    }
}
