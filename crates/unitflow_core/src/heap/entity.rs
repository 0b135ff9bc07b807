//! In-memory domain objects.

use crate::heap::EntityId;
use std::collections::BTreeMap;
use unitflow_storage::{Row, Value};

/// The value of a relation on an entity.
///
/// A relation that is absent from [`Entity::relations`] was never loaded and
/// is left alone by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    /// A to-one reference, `None` when explicitly empty.
    One(Option<EntityId>),
    /// A to-many collection.
    Many(Vec<EntityId>),
}

impl Related {
    /// Returns the referenced entities.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        match self {
            Self::One(id) => id.iter().copied().collect(),
            Self::Many(ids) => ids.clone(),
        }
    }
}

/// A domain object held by the heap.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    role: String,
    fields: Row,
    relations: BTreeMap<String, Related>,
}

impl Entity {
    /// Creates an empty entity of the given role.
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            fields: Row::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Sets a field, builder style.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a to-one relation, builder style.
    #[must_use]
    pub fn with_one(mut self, relation: impl Into<String>, target: Option<EntityId>) -> Self {
        self.relations.insert(relation.into(), Related::One(target));
        self
    }

    /// Sets a to-many relation, builder style.
    #[must_use]
    pub fn with_many(mut self, relation: impl Into<String>, targets: Vec<EntityId>) -> Self {
        self.relations.insert(relation.into(), Related::Many(targets));
        self
    }

    /// Returns the role.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns all field values.
    #[must_use]
    pub fn fields(&self) -> &Row {
        &self.fields
    }

    /// Returns a relation value, `None` if not loaded.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    /// Replaces a relation value.
    pub fn set_relation(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    /// Adds an entity to a to-many relation, creating it if needed.
    pub fn push_related(&mut self, name: &str, target: EntityId) {
        match self.relations.get_mut(name) {
            Some(Related::Many(ids)) => ids.push(target),
            _ => {
                self.relations
                    .insert(name.to_string(), Related::Many(vec![target]));
            }
        }
    }

    /// Returns all loaded relations.
    #[must_use]
    pub fn relations(&self) -> &BTreeMap<String, Related> {
        &self.relations
    }
}
