//! Role metadata: mappers, relations and class hierarchies.

use crate::error::{CoreError, CoreResult};
use crate::heap::Entity;
use crate::mapper::Mapper;
use crate::relation::{BelongsTo, Embedded, HasMany, HasOne, Relation, ShadowBelongsTo};
use std::collections::HashMap;
use std::sync::Arc;
use unitflow_storage::Row;

/// Relations of one role, split by the task they gate.
#[derive(Debug, Default)]
pub struct RelationMap {
    masters: Vec<Arc<dyn Relation>>,
    slaves: Vec<Arc<dyn Relation>>,
    embedded: Vec<Embedded>,
}

impl RelationMap {
    const EMPTY: Self = Self {
        masters: Vec::new(),
        slaves: Vec::new(),
        embedded: Vec::new(),
    };

    /// Relations that must resolve before the role can be stored.
    #[must_use]
    pub fn masters(&self) -> &[Arc<dyn Relation>] {
        &self.masters
    }

    /// Relations that must resolve before the role can be deleted.
    #[must_use]
    pub fn slaves(&self) -> &[Arc<dyn Relation>] {
        &self.slaves
    }

    /// Embedded value objects.
    #[must_use]
    pub fn embedded(&self) -> &[Embedded] {
        &self.embedded
    }
}

static NO_RELATIONS: RelationMap = RelationMap::EMPTY;

/// Joined-table inheritance link from a child role to its parent role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    /// The parent role.
    pub role: String,
    /// Key column of the parent table.
    pub outer_key: String,
    /// Column of the child table receiving the parent key.
    pub inner_key: String,
}

/// Everything the unit of work needs to know about roles.
#[derive(Debug, Default)]
pub struct Registry {
    mappers: HashMap<String, Arc<dyn Mapper>>,
    relations: HashMap<String, RelationMap>,
    parents: HashMap<String, ParentLink>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapper under its role.
    pub fn register(&mut self, mapper: impl Mapper + 'static) -> &mut Self {
        self.register_shared(Arc::new(mapper))
    }

    /// Registers a shared mapper under its role.
    pub fn register_shared(&mut self, mapper: Arc<dyn Mapper>) -> &mut Self {
        self.mappers.insert(mapper.role().to_string(), mapper);
        self
    }

    /// Declares `role` a child of `parent` in a joined-table hierarchy.
    ///
    /// Inserting a `role` entity inserts a row in every table up the chain,
    /// copying `outer_key` of each parent row into `inner_key` of the child
    /// row.
    pub fn extend(
        &mut self,
        role: impl Into<String>,
        parent: impl Into<String>,
        outer_key: impl Into<String>,
        inner_key: impl Into<String>,
    ) -> &mut Self {
        self.parents.insert(
            role.into(),
            ParentLink {
                role: parent.into(),
                outer_key: outer_key.into(),
                inner_key: inner_key.into(),
            },
        );
        self
    }

    /// Adds a relation gating the store of `role`.
    pub fn add_master(&mut self, role: impl Into<String>, relation: Arc<dyn Relation>) -> &mut Self {
        self.relations.entry(role.into()).or_default().masters.push(relation);
        self
    }

    /// Adds a relation gating the delete of `role`.
    pub fn add_slave(&mut self, role: impl Into<String>, relation: Arc<dyn Relation>) -> &mut Self {
        self.relations.entry(role.into()).or_default().slaves.push(relation);
        self
    }

    /// Adds a many-to-one reference from `role`.
    pub fn belongs_to(&mut self, role: impl Into<String>, relation: BelongsTo) -> &mut Self {
        self.add_master(role, Arc::new(relation))
    }

    /// Adds a one-to-many relation from `role`, along with its inverse on the
    /// child role.
    pub fn has_many(&mut self, role: impl Into<String>, mut relation: HasMany) -> &mut Self {
        let role = role.into();
        let inverse = format!("{role}.{}", relation.name());
        relation.set_inverse(&inverse);
        let shadow = ShadowBelongsTo::new(inverse, &role, relation.outer_key());
        let target = relation.target().to_string();
        self.add_slave(role, Arc::new(relation));
        self.add_master(target, Arc::new(shadow))
    }

    /// Adds a one-to-one relation from `role`, along with its inverse on the
    /// child role.
    pub fn has_one(&mut self, role: impl Into<String>, mut relation: HasOne) -> &mut Self {
        let role = role.into();
        let inverse = format!("{role}.{}", relation.name());
        relation.set_inverse(&inverse);
        let shadow = ShadowBelongsTo::new(inverse, &role, relation.outer_key());
        let target = relation.target().to_string();
        self.add_slave(role, Arc::new(relation));
        self.add_master(target, Arc::new(shadow))
    }

    /// Embeds a value object into `role`'s row.
    pub fn embed(&mut self, role: impl Into<String>, embedded: Embedded) -> &mut Self {
        self.relations.entry(role.into()).or_default().embedded.push(embedded);
        self
    }

    /// Returns the mapper of a role.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownRole`] if none is registered.
    pub fn mapper(&self, role: &str) -> CoreResult<&dyn Mapper> {
        self.mappers
            .get(role)
            .map(|m| m.as_ref())
            .ok_or_else(|| CoreError::unknown_role(role))
    }

    /// Returns true if a mapper is registered for `role`.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.mappers.contains_key(role)
    }

    /// Returns the relations of a role (own relations only, not inherited).
    #[must_use]
    pub fn relation_map(&self, role: &str) -> &RelationMap {
        self.relations.get(role).unwrap_or(&NO_RELATIONS)
    }

    /// Returns the parent link of a role.
    #[must_use]
    pub fn parent(&self, role: &str) -> Option<&ParentLink> {
        self.parents.get(role)
    }

    /// Returns the roles of a hierarchy from the root down to `role`.
    ///
    /// # Errors
    ///
    /// Returns an error if a role in the chain has no mapper or the chain
    /// loops.
    pub fn chain<'r>(&'r self, role: &'r str) -> CoreResult<Vec<&'r str>> {
        let mut chain = vec![role];
        let mut current = role;
        while let Some(link) = self.parents.get(current) {
            if chain.contains(&link.role.as_str()) {
                return Err(CoreError::invalid_operation(format!(
                    "inheritance cycle through `{}`",
                    link.role
                )));
            }
            chain.push(&link.role);
            current = &link.role;
        }
        chain.reverse();
        for role in &chain {
            self.mapper(role)?;
        }
        Ok(chain)
    }

    /// Extracts the columns of every level of the entity's hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if the role is unknown.
    pub fn extract(&self, entity: &Entity) -> CoreResult<Row> {
        let mut row = Row::new();
        for role in self.chain(entity.role())? {
            row.extend(self.mapper(role)?.extract(entity));
        }
        Ok(row)
    }

    /// Writes stored values back into the entity through every level's
    /// mapper. Roles without a mapper (embedded values) are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the hierarchy is broken.
    pub fn hydrate(&self, entity: &mut Entity, data: &Row) -> CoreResult<()> {
        if !self.contains(entity.role()) {
            return Ok(());
        }
        let role = entity.role().to_string();
        for level in self.chain(&role)? {
            self.mapper(level)?.hydrate(entity, data);
        }
        Ok(())
    }
}
