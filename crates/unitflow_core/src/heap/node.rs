//! Per-entity bookkeeping: persisted snapshot and transactional state.

use crate::heap::Related;
use crate::relation::RelationStatus;
use std::collections::{BTreeMap, BTreeSet};
use unitflow_storage::{Row, Value};

/// Lifecycle of an entity relative to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    /// Not yet stored.
    New,
    /// Loaded from or written to the store.
    Managed,
    /// Delete requested in the running unit of work.
    ScheduledDelete,
    /// Removed from the store.
    Deleted,
}

/// Transactional state of an entity for one unit of work.
///
/// The state collects everything the scheduler learns while a run is in
/// flight. It becomes the persisted snapshot on commit and is dropped on
/// rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    status: NodeStatus,
    data: Row,
    relation_status: BTreeMap<String, RelationStatus>,
    relations: BTreeMap<String, Related>,
    /// Fields whose value is still expected from a master record.
    waiting: BTreeSet<String>,
    /// What the store holds after a write inside the running unit of work.
    stored: Option<Row>,
}

impl State {
    pub(crate) fn new(status: NodeStatus, data: Row) -> Self {
        Self {
            status,
            data,
            relation_status: BTreeMap::new(),
            relations: BTreeMap::new(),
            waiting: BTreeSet::new(),
            stored: None,
        }
    }

    /// Copies extracted entity values over the state's data.
    pub(crate) fn overlay(&mut self, row: Row) {
        self.data.extend(row);
    }

    /// Records that the current data was written; waiting fields were
    /// written as null.
    pub fn mark_stored(&mut self) {
        let mut stored = self.data.clone();
        for field in &self.waiting {
            stored.insert(field.clone(), Value::Null);
        }
        self.stored = Some(stored);
    }

    /// Returns the lifecycle flag for this run.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Sets the lifecycle flag for this run.
    pub fn set_status(&mut self, status: NodeStatus) {
        self.status = status;
    }

    /// Returns the transactional data.
    #[must_use]
    pub fn data(&self) -> &Row {
        &self.data
    }

    /// Returns one transactional value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Stores a value produced during the run and stops waiting for it.
    pub fn register(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        self.waiting.remove(&field);
        self.data.insert(field, value);
    }

    /// Stores every value of `row`.
    pub fn register_all(&mut self, row: Row) {
        for (field, value) in row {
            self.register(field, value);
        }
    }

    /// Marks a field as waiting for a master's key.
    pub fn wait(&mut self, field: impl Into<String>) {
        self.waiting.insert(field.into());
    }

    /// Returns true while `field` waits for a value.
    #[must_use]
    pub fn is_waiting(&self, field: &str) -> bool {
        self.waiting.contains(field)
    }

    /// Returns the waiting fields.
    #[must_use]
    pub fn waiting(&self) -> &BTreeSet<String> {
        &self.waiting
    }

    /// Returns the resolution status of a relation, `Prepare` if untouched.
    #[must_use]
    pub fn relation_status(&self, relation: &str) -> RelationStatus {
        self.relation_status
            .get(relation)
            .copied()
            .unwrap_or(RelationStatus::Prepare)
    }

    /// Sets the resolution status of a relation.
    pub fn set_relation_status(&mut self, relation: impl Into<String>, status: RelationStatus) {
        self.relation_status.insert(relation.into(), status);
    }

    /// Returns the relation value captured during resolution.
    #[must_use]
    pub fn relation(&self, relation: &str) -> Option<&Related> {
        self.relations.get(relation)
    }

    /// Returns every relation value captured during resolution.
    #[must_use]
    pub fn relations(&self) -> &BTreeMap<String, Related> {
        &self.relations
    }

    /// Captures a relation value during resolution.
    pub fn set_relation(&mut self, relation: impl Into<String>, related: Related) {
        self.relations.insert(relation.into(), related);
    }

    /// Returns the fields that differ from what the store holds, excluding
    /// waiting ones. `snapshot` is used unless the run already wrote the
    /// entity.
    #[must_use]
    pub fn changes(&self, snapshot: &Row) -> Row {
        let snapshot = self.stored.as_ref().unwrap_or(snapshot);
        self.data
            .iter()
            .filter(|(field, _)| !self.waiting.contains(*field))
            .filter(|(field, value)| snapshot.get(*field).unwrap_or(&Value::Null) != *value)
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

/// Identity map entry of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    role: String,
    status: NodeStatus,
    data: Row,
    relations: BTreeMap<String, Related>,
    state: Option<State>,
}

impl Node {
    /// Creates a node.
    pub fn new(role: impl Into<String>, status: NodeStatus, data: Row) -> Self {
        Self {
            role: role.into(),
            status,
            data,
            relations: BTreeMap::new(),
            state: None,
        }
    }

    /// Returns the role.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns the persisted lifecycle flag.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Returns the persisted data snapshot.
    #[must_use]
    pub fn data(&self) -> &Row {
        &self.data
    }

    /// Returns the persisted relation snapshot.
    #[must_use]
    pub fn relations(&self) -> &BTreeMap<String, Related> {
        &self.relations
    }

    pub(crate) fn set_relations(&mut self, relations: BTreeMap<String, Related>) {
        self.relations = relations;
    }

    /// Returns the transactional state, if a run touched this node.
    #[must_use]
    pub fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    /// Returns the transactional state mutably.
    pub fn state_mut(&mut self) -> Option<&mut State> {
        self.state.as_mut()
    }

    /// Returns the state, creating it from the snapshot when missing.
    pub fn get_or_init_state(&mut self) -> &mut State {
        let (status, data) = (self.status, &self.data);
        self.state
            .get_or_insert_with(|| State::new(status, data.clone()))
    }

    pub(crate) fn replace_state(&mut self, state: Option<State>) {
        self.state = state;
    }

    /// Returns the value the store knows for `field`: the transactional one
    /// when present, the persisted one otherwise.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.state
            .as_ref()
            .and_then(|s| s.get(field))
            .or_else(|| self.data.get(field))
            .filter(|v| !v.is_null())
    }

    /// Makes the transactional state the new persisted snapshot.
    ///
    /// Returns the committed data.
    pub(crate) fn sync_state(&mut self) -> Option<Row> {
        let state = self.state.take()?;
        self.status = match state.status {
            NodeStatus::New | NodeStatus::Managed => NodeStatus::Managed,
            NodeStatus::ScheduledDelete | NodeStatus::Deleted => NodeStatus::Deleted,
        };
        self.data = state.data;
        Some(self.data.clone())
    }

    /// Discards the transactional state.
    pub(crate) fn reset_state(&mut self) {
        self.state = None;
    }
}
