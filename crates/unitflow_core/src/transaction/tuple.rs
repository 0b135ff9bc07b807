//! Scheduling record of one entity.

use crate::heap::EntityId;
use std::fmt;

/// What should happen to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Insert or update.
    Store,
    /// Delete once nothing depends on the entity.
    Delete,
    /// Delete, escalated by the scheduler or requested by a cascade.
    ForceDelete,
}

impl Task {
    /// Returns true for both delete variants.
    #[must_use]
    pub const fn is_delete(self) -> bool {
        matches!(self, Self::Delete | Self::ForceDelete)
    }
}

/// Progress of a record through the scheduler.
///
/// Ordering matters: comparisons such as "before `Proposed`" are done on the
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskStatus {
    /// Attached, not visited yet.
    Preparing,
    /// Visited once, waiting for dependencies.
    Waiting,
    /// Promoted after all records were prepared.
    Waited,
    /// Allowed to be written while some relation is still pending.
    Deferred,
    /// Promoted from `Deferred` in the last stage.
    Proposed,
    /// Last chance before being parked.
    Preprocessed,
    /// Parked until another record gets processed.
    Unprocessed,
    /// Done. Terminal.
    Processed,
}

impl TaskStatus {
    /// The status a record moves to after a visit that left it untouched.
    ///
    /// Only transitional statuses advance; the others stay.
    #[must_use]
    pub const fn advance(self) -> Self {
        match self {
            Self::Preparing => Self::Waiting,
            Self::Waited => Self::Deferred,
            Self::Proposed => Self::Preprocessed,
            other => other,
        }
    }
}

/// The record the pool keeps for each scheduled entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    entity: EntityId,
    role: String,
    task: Task,
    status: TaskStatus,
    cascade: bool,
}

impl Tuple {
    pub(crate) fn new(entity: EntityId, role: &str, task: Task, cascade: bool, status: TaskStatus) -> Self {
        Self {
            entity,
            role: role.to_string(),
            task,
            status,
            cascade,
        }
    }

    /// Returns the entity.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Returns the entity's role.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns the task.
    #[must_use]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns true if related entities follow this one's task.
    #[must_use]
    pub fn cascade(&self) -> bool {
        self.cascade
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn set_task(&mut self, task: Task) {
        self.task = task;
    }

    pub(crate) fn set_cascade(&mut self, cascade: bool) {
        self.cascade = cascade;
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}/{:?}", self.role, self.entity, self.task, self.status)
    }
}
