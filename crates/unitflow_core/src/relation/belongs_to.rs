//! Many-to-one reference held by the owning entity.

use super::{Relation, RelationStatus, Scope};
use crate::error::{CoreError, CoreResult};
use crate::heap::{EntityId, Related};
use crate::transaction::{Task, TaskStatus};
use tracing::trace;
use unitflow_storage::Value;

/// The owner carries a foreign key (`inner_key`) to the target's
/// `outer_key`. The target must be written first.
#[derive(Debug, Clone)]
pub struct BelongsTo {
    name: String,
    target: String,
    inner_key: String,
    outer_key: String,
    nullable: bool,
    cascade: bool,
}

impl BelongsTo {
    /// Creates a required, cascading reference.
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        inner_key: impl Into<String>,
        outer_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            inner_key: inner_key.into(),
            outer_key: outer_key.into(),
            nullable: false,
            cascade: true,
        }
    }

    /// Allows the foreign key to be null.
    ///
    /// A nullable reference can be deferred: the owner is inserted with a
    /// null key and updated once the target exists.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets whether the target is stored along with the owner.
    #[must_use]
    pub fn cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    /// Returns the owner's foreign key field.
    #[must_use]
    pub fn inner_key(&self) -> &str {
        &self.inner_key
    }

    /// Returns the target's key field.
    #[must_use]
    pub fn outer_key(&self) -> &str {
        &self.outer_key
    }

    /// Returns true if the foreign key may be null.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    fn clear(&self, scope: &mut Scope<'_>, entity: EntityId) -> CoreResult<()> {
        if !self.nullable {
            return Err(CoreError::null_relation(scope.role_of(entity)?, &self.name));
        }
        let state = scope.state_mut(entity)?;
        state.set_relation(&self.name, Related::One(None));
        state.register(&self.inner_key, Value::Null);
        state.set_relation_status(&self.name, RelationStatus::Resolved);
        Ok(())
    }
}

impl Relation for BelongsTo {
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
        has_changes: bool,
    ) -> CoreResult<()> {
        if scope.task(entity).is_some_and(Task::is_delete) {
            return scope.set_relation_status(entity, &self.name, RelationStatus::Resolved);
        }

        let parent = match related {
            None => {
                return scope.set_relation_status(entity, &self.name, RelationStatus::Resolved);
            }
            Some(Related::Many(_)) => {
                return Err(CoreError::invalid_relation(
                    scope.role_of(entity)?,
                    &self.name,
                    "expected a single reference",
                ));
            }
            Some(Related::One(None)) => return self.clear(scope, entity),
            Some(Related::One(Some(parent))) => *parent,
        };

        // An untouched reference to a parent being deleted goes away with it.
        // A new reference revives a soft-deleted parent instead.
        if !has_changes && scope.task(parent).is_some_and(Task::is_delete) {
            trace!(relation = %self.name, %entity, %parent, "parent scheduled for deletion");
            return self.clear(scope, entity);
        }

        // A parent gone from the store, or forced out of it, can't be revived.
        if scope.is_removed(parent) || scope.task(parent) == Some(Task::ForceDelete) {
            trace!(relation = %self.name, %entity, %parent, "parent is deleted");
            if !self.nullable {
                return Err(CoreError::invalid_relation(
                    scope.role_of(entity)?,
                    &self.name,
                    format!("references deleted entity {parent}"),
                ));
            }
            return self.clear(scope, entity);
        }

        scope
            .state_mut(entity)?
            .set_relation(&self.name, Related::One(Some(parent)));

        if !has_changes && !self.cascade && scope.key(parent, &self.outer_key).is_some() {
            return scope.set_relation_status(entity, &self.name, RelationStatus::Resolved);
        }

        scope.attach_store(parent, self.cascade)?;
        let state = scope.state_mut(entity)?;
        state.wait(&self.inner_key);
        state.set_relation_status(&self.name, RelationStatus::Process);
        self.queue(scope, entity)
    }

    fn queue(&self, scope: &mut Scope<'_>, entity: EntityId) -> CoreResult<()> {
        let parent = match scope.state(entity).and_then(|s| s.relation(&self.name)) {
            Some(Related::One(Some(parent))) => *parent,
            _ => return scope.set_relation_status(entity, &self.name, RelationStatus::Resolved),
        };

        if let Some(key) = scope.key(parent, &self.outer_key) {
            trace!(relation = %self.name, %entity, %parent, "master key available");
            let state = scope.state_mut(entity)?;
            state.register(&self.inner_key, key);
            state.set_relation_status(&self.name, RelationStatus::Resolved);
            return Ok(());
        }

        let waited = scope
            .status(entity)
            .is_some_and(|s| s >= TaskStatus::Waited);
        let status = if self.nullable && waited {
            RelationStatus::Deferred
        } else {
            RelationStatus::Process
        };
        scope.set_relation_status(entity, &self.name, status)
    }
}
