//! Staged scheduler of pending records.
//!
//! The pool holds at most one [`Tuple`] per entity and hands them out one at
//! a time through a cursor (`open`, `next_task`, `close`). Records attached
//! while a record is being visited go to the priority partition and are
//! visited next. Otherwise the pool works in stages:
//!
//! 0. Records never visited (`Preparing`).
//! 1. Once none is left: store records still `Waiting`, promoted to `Waited`.
//! 2. Then any remaining record. A soft delete escalates to `ForceDelete`,
//!    `Waiting` becomes `Waited` and `Deferred` becomes `Proposed`.
//!
//! Every yield restarts at stage 0. When the visit of a record ends it is
//! retired (`Processed`), parked (`Unprocessed`), or advanced one status and
//! put back. Parked records return as `Preprocessed` whenever some other
//! record gets processed.

use super::tuple::{Task, TaskStatus, Tuple};
use crate::error::{CoreError, CoreResult};
use crate::heap::EntityId;
use indexmap::IndexSet;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Cursor {
    #[default]
    Idle,
    Open,
    Closed,
}

/// Pending records of one unit of work.
#[derive(Debug, Default)]
pub struct Pool {
    records: HashMap<EntityId, Tuple>,
    normal: IndexSet<EntityId>,
    priority: IndexSet<EntityId>,
    parked: IndexSet<EntityId>,
    current: Option<EntityId>,
    cursor: Cursor,
    priority_enabled: bool,
}

impl Pool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an entity, or merges the request into its existing record.
    ///
    /// On merge the cascade flag is OR-ed, a requested `ForceDelete` always
    /// wins, a soft `Delete` yields to any other task, and a requested status
    /// applies only while the record is `Preparing`. A processed record is
    /// never changed. Requesting `Processed` retires the record at once.
    pub fn attach(
        &mut self,
        entity: EntityId,
        role: &str,
        task: Task,
        cascade: bool,
        status: Option<TaskStatus>,
    ) -> &Tuple {
        if self.records.contains_key(&entity) {
            self.merge(entity, task, cascade, status);
        } else {
            let status = status.unwrap_or(TaskStatus::Preparing);
            self.records
                .insert(entity, Tuple::new(entity, role, task, cascade, status));
            if status == TaskStatus::Processed {
                self.retire(entity);
            } else if self.priority_enabled {
                trace!(%entity, role, ?task, "attached with priority");
                self.priority.insert(entity);
            } else {
                trace!(%entity, role, ?task, "attached");
                self.normal.insert(entity);
            }
        }
        &self.records[&entity]
    }

    fn merge(&mut self, entity: EntityId, task: Task, cascade: bool, status: Option<TaskStatus>) {
        let Some(tuple) = self.records.get_mut(&entity) else {
            return;
        };
        if tuple.status() == TaskStatus::Processed {
            return;
        }

        if cascade {
            tuple.set_cascade(true);
        }
        match (tuple.task(), task) {
            (current, requested) if current == requested => {}
            (_, Task::ForceDelete) => tuple.set_task(Task::ForceDelete),
            (Task::Delete, requested) => tuple.set_task(requested),
            _ => {}
        }

        match status {
            Some(TaskStatus::Processed) => {
                tuple.set_status(TaskStatus::Processed);
                self.retire(entity);
            }
            Some(status) if tuple.status() == TaskStatus::Preparing => tuple.set_status(status),
            _ => {}
        }
    }

    /// Returns the record of an entity.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&Tuple> {
        self.records.get(&entity)
    }

    pub(crate) fn get_mut(&mut self, entity: EntityId) -> Option<&mut Tuple> {
        self.records.get_mut(&entity)
    }

    /// Returns true if the entity was ever scheduled in this pool.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.records.contains_key(&entity)
    }

    /// Number of records waiting in the normal and priority partitions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.normal.len() + self.priority.len()
    }

    /// Returns true when nothing is waiting to be visited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Number of parked records.
    #[must_use]
    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    /// Every record, processed or not.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.records.values()
    }

    /// Records that never got processed.
    pub fn unresolved(&self) -> impl Iterator<Item = &Tuple> {
        self.records
            .values()
            .filter(|t| t.status() != TaskStatus::Processed)
    }

    /// Returns the record being visited.
    #[must_use]
    pub fn current(&self) -> Option<EntityId> {
        self.current
    }

    /// Starts iteration. A pool is iterated once.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is already open or was closed.
    pub fn open(&mut self) -> CoreResult<()> {
        match self.cursor {
            Cursor::Idle => {
                self.cursor = Cursor::Open;
                Ok(())
            }
            Cursor::Open => Err(CoreError::invalid_operation("pool is already being iterated")),
            Cursor::Closed => Err(CoreError::invalid_operation("pool was already iterated")),
        }
    }

    /// Ends the visit of the previous record and yields the next one, or
    /// `None` when both partitions are empty.
    pub fn next_task(&mut self) -> Option<EntityId> {
        if self.cursor != Cursor::Open {
            return None;
        }
        if let Some(previous) = self.current.take() {
            self.finalize(previous);
        }
        self.priority_enabled = false;

        let next = self.select();
        if let Some(entity) = next {
            self.current = Some(entity);
            self.priority_enabled = true;
        }
        next
    }

    /// Stops iteration. An in-flight record is left as it is.
    pub fn close(&mut self) {
        self.current = None;
        self.priority_enabled = false;
        self.cursor = Cursor::Closed;
    }

    fn status_of(&self, entity: &EntityId) -> Option<TaskStatus> {
        self.records.get(entity).map(Tuple::status)
    }

    fn select(&mut self) -> Option<EntityId> {
        if let Some(entity) = self.priority.shift_remove_index(0) {
            return Some(entity);
        }

        if let Some(pos) = self
            .normal
            .iter()
            .position(|e| self.status_of(e) == Some(TaskStatus::Preparing))
        {
            return self.normal.shift_remove_index(pos);
        }

        if let Some(pos) = self.normal.iter().position(|e| {
            self.records
                .get(e)
                .is_some_and(|t| t.status() == TaskStatus::Waiting && !t.task().is_delete())
        }) {
            let entity = self.normal.shift_remove_index(pos)?;
            if let Some(tuple) = self.records.get_mut(&entity) {
                tuple.set_status(TaskStatus::Waited);
            }
            return Some(entity);
        }

        let entity = self.normal.shift_remove_index(0)?;
        if let Some(tuple) = self.records.get_mut(&entity) {
            if tuple.task() == Task::Delete {
                tuple.set_task(Task::ForceDelete);
            }
            match tuple.status() {
                TaskStatus::Waiting => tuple.set_status(TaskStatus::Waited),
                TaskStatus::Deferred => tuple.set_status(TaskStatus::Proposed),
                _ => {}
            }
        }
        Some(entity)
    }

    fn finalize(&mut self, entity: EntityId) {
        let Some(tuple) = self.records.get_mut(&entity) else {
            return;
        };
        match tuple.status() {
            TaskStatus::Processed => self.retire(entity),
            TaskStatus::Unprocessed => {
                trace!(%entity, "parked");
                self.parked.insert(entity);
            }
            status => {
                tuple.set_status(status.advance());
                self.normal.insert(entity);
            }
        }
    }

    /// Drops a processed record from every partition and gives parked
    /// records another chance.
    fn retire(&mut self, entity: EntityId) {
        self.normal.shift_remove(&entity);
        self.priority.shift_remove(&entity);
        self.parked.shift_remove(&entity);

        for parked in self.parked.drain(..) {
            if let Some(tuple) = self.records.get_mut(&parked) {
                tuple.set_status(TaskStatus::Preprocessed);
            }
            self.normal.insert(parked);
        }
    }
}
