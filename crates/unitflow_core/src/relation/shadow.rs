//! Inverse side of a one-to-many or one-to-one relation.

use super::{Relation, RelationStatus, Scope};
use crate::error::CoreResult;
use crate::heap::{EntityId, Related};
use crate::transaction::{Task, TaskStatus};

/// Registered on the child role for every [`HasMany`](super::HasMany) or
/// [`HasOne`](super::HasOne). It keeps a child from being written while its
/// parent still owes it a key.
///
/// The parent side drives it: connecting a child sets the status to
/// `Process`, pushing the key sets it to `Resolved`. A child no parent
/// connects during its first visit is written on its own.
#[derive(Debug, Clone)]
pub struct ShadowBelongsTo {
    name: String,
    target: String,
    outer_key: String,
}

impl ShadowBelongsTo {
    /// Creates a shadow relation pointing back at `target`.
    pub fn new(name: impl Into<String>, target: impl Into<String>, outer_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            outer_key: outer_key.into(),
        }
    }

    /// Returns the child's foreign key field.
    #[must_use]
    pub fn outer_key(&self) -> &str {
        &self.outer_key
    }
}

impl Relation for ShadowBelongsTo {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn is_cascade(&self) -> bool {
        false
    }

    fn prepare(
        &self,
        scope: &mut Scope<'_>,
        entity: EntityId,
        _related: Option<&Related>,
        _has_changes: bool,
    ) -> CoreResult<()> {
        if scope.task(entity).is_some_and(Task::is_delete) {
            return scope.set_relation_status(entity, &self.name, RelationStatus::Resolved);
        }
        // Give a parent scheduled later in the first stage a chance to connect.
        if scope.status(entity) == Some(TaskStatus::Preparing) {
            return Ok(());
        }
        scope.set_relation_status(entity, &self.name, RelationStatus::Resolved)
    }

    fn queue(&self, _scope: &mut Scope<'_>, _entity: EntityId) -> CoreResult<()> {
        Ok(())
    }
}
