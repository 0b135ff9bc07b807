//! Error types for UnitFlow core.

use crate::heap::EntityId;
use crate::transaction::{Task, TaskStatus};
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// A record the scheduler could not bring to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// The stuck entity.
    pub entity: EntityId,
    /// Its role.
    pub role: String,
    /// The requested task.
    pub task: Task,
    /// The status it was left in.
    pub status: TaskStatus,
    /// Relations that never resolved.
    pub relations: Vec<String>,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` {} ({:?}, {:?})",
            self.role, self.entity, self.task, self.status
        )?;
        if !self.relations.is_empty() {
            write!(f, " waiting on [{}]", self.relations.join(", "))?;
        }
        Ok(())
    }
}

fn list(entries: &[Unresolved]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur in UnitFlow core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage layer error while executing a command.
    #[error("storage error: {0}")]
    Storage(#[from] unitflow_storage::StorageError),

    /// The pool drained while some records never got processed.
    #[error("unresolved relations: {}", list(.entries))]
    UnresolvedRelations {
        /// Every record left behind.
        entries: Vec<Unresolved>,
    },

    /// A required relation was cleared without a replacement.
    #[error("relation `{relation}` of `{role}` is required but empty")]
    NullRelation {
        /// The owning role.
        role: String,
        /// The relation name.
        relation: String,
    },

    /// A relation received data of the wrong shape.
    #[error("relation `{relation}` of `{role}` got invalid data: {message}")]
    InvalidRelation {
        /// The owning role.
        role: String,
        /// The relation name.
        relation: String,
        /// What was wrong.
        message: String,
    },

    /// No mapper is registered for a role.
    #[error("no mapper registered for role `{role}`")]
    UnknownRole {
        /// The role.
        role: String,
    },

    /// The entity is not known to the heap.
    #[error("entity not found in heap: {entity}")]
    EntityNotFound {
        /// The entity id.
        entity: EntityId,
    },

    /// A command was handed to the runner before it could execute.
    #[error("command not ready: {command}")]
    CommandNotReady {
        /// Description of the command.
        command: String,
    },

    /// The scheduler visited more records than the configured limit.
    #[error("iteration limit of {limit} records exceeded")]
    IterationLimit {
        /// The configured limit.
        limit: usize,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an unresolved relations error.
    pub fn unresolved_relations(entries: Vec<Unresolved>) -> Self {
        Self::UnresolvedRelations { entries }
    }

    /// Creates a null relation error.
    pub fn null_relation(role: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::NullRelation {
            role: role.into(),
            relation: relation.into(),
        }
    }

    /// Creates an invalid relation data error.
    pub fn invalid_relation(
        role: impl Into<String>,
        relation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRelation {
            role: role.into(),
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown role error.
    pub fn unknown_role(role: impl Into<String>) -> Self {
        Self::UnknownRole { role: role.into() }
    }

    /// Creates an entity not found error.
    pub fn entity_not_found(entity: EntityId) -> Self {
        Self::EntityNotFound { entity }
    }

    /// Creates a command not ready error.
    pub fn command_not_ready(command: impl Into<String>) -> Self {
        Self::CommandNotReady {
            command: command.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true when the failure came from scheduling rather than execution.
    #[must_use]
    pub fn is_scheduling_failure(&self) -> bool {
        matches!(self, Self::UnresolvedRelations { .. })
    }
}
