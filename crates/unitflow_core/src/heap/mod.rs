//! Identity map.
//!
//! The heap owns every entity taking part in persistence, keyed by
//! [`EntityId`]. Next to each entity it keeps a [`Node`]: the lifecycle flag,
//! the data snapshot last written to (or read from) the store, and the
//! transactional [`State`] of the running unit of work.
//!
//! The heap is passed explicitly to the unit of work; there is no global
//! registry of entities.

mod entity;
mod id;
mod node;

pub use entity::{Entity, Related};
pub use id::EntityId;
pub use node::{Node, NodeStatus, State};

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use unitflow_storage::Row;

/// Identity map of entities and their nodes.
#[derive(Debug, Default)]
pub struct Heap {
    entities: HashMap<EntityId, Entity>,
    nodes: HashMap<EntityId, Node>,
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new, not yet stored entity.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        let id = EntityId::new();
        let node = Node::new(entity.role(), NodeStatus::New, Row::new());
        self.entities.insert(id, entity);
        self.nodes.insert(id, node);
        id
    }

    /// Adds an entity loaded from the store.
    ///
    /// Its current fields and relations become the persisted snapshot.
    pub fn attach_managed(&mut self, entity: Entity) -> EntityId {
        let id = EntityId::new();
        let mut node = Node::new(entity.role(), NodeStatus::Managed, entity.fields().clone());
        node.set_relations(entity.relations().clone());
        self.entities.insert(id, entity);
        self.nodes.insert(id, node);
        id
    }

    /// Removes an entity and its node.
    pub fn detach(&mut self, id: EntityId) -> Option<Entity> {
        self.nodes.remove(&id);
        self.entities.remove(&id)
    }

    /// Returns true if the heap holds `id`.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the heap is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns an entity mutably.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Returns a node.
    #[must_use]
    pub fn node(&self, id: EntityId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Returns a node mutably.
    pub fn node_mut(&mut self, id: EntityId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Returns the transactional state of an entity, if any.
    #[must_use]
    pub fn state(&self, id: EntityId) -> Option<&State> {
        self.nodes.get(&id).and_then(Node::state)
    }

    /// Returns the transactional state of an entity mutably.
    pub fn state_mut(&mut self, id: EntityId) -> Option<&mut State> {
        self.nodes.get_mut(&id).and_then(Node::state_mut)
    }

    /// Returns the state of an entity, failing if the heap doesn't know it.
    pub fn require_state(&mut self, id: EntityId) -> CoreResult<&mut State> {
        self.state_mut(id)
            .ok_or_else(|| CoreError::entity_not_found(id))
    }

    /// Returns every node that currently carries transactional state.
    pub fn states(&self) -> impl Iterator<Item = (EntityId, &State)> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| node.state().map(|s| (*id, s)))
    }

    /// Replaces the transactional state of an entity.
    pub(crate) fn restore_state(&mut self, id: EntityId, state: Option<State>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.replace_state(state);
        }
    }

    /// Commits the transactional state of an entity into its snapshot.
    ///
    /// Returns the committed data, or `None` if the entity had no state.
    /// Relations resolved during the run are written back into the entity,
    /// so a cleared reference is gone from both the entity and the relation
    /// snapshot.
    pub fn sync_state(&mut self, id: EntityId) -> Option<Row> {
        let resolved = self.nodes.get(&id)?.state()?.relations().clone();
        let entity = self.entities.get_mut(&id)?;
        for (name, related) in resolved {
            entity.set_relation(name, related);
        }
        let relations = entity.relations().clone();

        let node = self.nodes.get_mut(&id)?;
        let data = node.sync_state()?;
        node.set_relations(relations);
        Some(data)
    }

    /// Drops the transactional state of an entity.
    pub fn reset_state(&mut self, id: EntityId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.reset_state();
        }
    }
}
