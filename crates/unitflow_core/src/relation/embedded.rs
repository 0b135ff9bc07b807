//! Value objects stored in the owner's row.

use super::{RelationStatus, Scope};
use crate::error::{CoreError, CoreResult};
use crate::heap::{EntityId, Related};
use crate::transaction::{Task, TaskStatus};

/// An embedded entity has no table of its own. Its fields are copied into
/// the owner's state, prefixed, before the owner's command is generated.
#[derive(Debug, Clone)]
pub struct Embedded {
    name: String,
    target: String,
    prefix: String,
}

impl Embedded {
    /// Creates an embedding whose columns are `<prefix><field>`.
    pub fn new(name: impl Into<String>, target: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            prefix: prefix.into(),
        }
    }

    /// Returns the relation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the embedded role.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the column prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Copies the embedded entity's fields into the owner's state and marks
    /// the embedded entity processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the relation holds a collection or the heap lost
    /// track of the embedded entity.
    pub fn merge(&self, scope: &mut Scope<'_>, owner: EntityId) -> CoreResult<()> {
        let related = scope
            .heap()
            .entity(owner)
            .ok_or_else(|| CoreError::entity_not_found(owner))?
            .relation(&self.name)
            .cloned();

        let sub = match related {
            Some(Related::One(Some(sub))) => sub,
            Some(Related::Many(_)) => {
                return Err(CoreError::invalid_relation(
                    scope.role_of(owner)?,
                    &self.name,
                    "embedded values are single references",
                ));
            }
            _ => return scope.set_relation_status(owner, &self.name, RelationStatus::Resolved),
        };

        let fields = scope
            .heap()
            .entity(sub)
            .ok_or_else(|| CoreError::entity_not_found(sub))?
            .fields()
            .clone();

        let state = scope.state_mut(owner)?;
        for (field, value) in &fields {
            state.register(format!("{}{field}", self.prefix), value.clone());
        }
        state.set_relation_status(&self.name, RelationStatus::Resolved);

        let role = scope.role_of(sub)?;
        if let Some(node) = scope.heap_mut().node_mut(sub) {
            node.get_or_init_state().overlay(fields);
        }
        scope
            .pool_mut()
            .attach(sub, &role, Task::Store, false, Some(TaskStatus::Processed));
        Ok(())
    }
}
