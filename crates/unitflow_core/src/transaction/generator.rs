//! Store and delete command generation.

use crate::command::{Command, Linked, Sequence};
use crate::error::{CoreError, CoreResult};
use crate::heap::{EntityId, Heap, NodeStatus};
use crate::registry::Registry;
use tracing::trace;

/// Builds the commands that write one entity.
///
/// For a role in a joined-table hierarchy the store command covers every
/// table from the root down, so each level's mapper only ever sees its own
/// columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandGenerator;

impl CommandGenerator {
    /// Creates a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the insert or update of an entity, `None` when there is
    /// nothing to write.
    ///
    /// A new entity gets one insert per level; every insert after the root's
    /// takes the parent level's key right before it runs. A stored entity
    /// gets one update per level that changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap or registry doesn't know the entity.
    pub fn generate_store_command(
        &self,
        registry: &Registry,
        heap: &Heap,
        entity: EntityId,
    ) -> CoreResult<Option<Box<dyn Command>>> {
        let (data, node) = heap
            .entity(entity)
            .zip(heap.node(entity))
            .ok_or_else(|| CoreError::entity_not_found(entity))?;
        let state = node
            .state()
            .ok_or_else(|| CoreError::entity_not_found(entity))?;
        let create = state.status() == NodeStatus::New;

        let mut commands: Vec<Box<dyn Command>> = Vec::new();
        for role in registry.chain(data.role())? {
            let mapper = registry.mapper(role)?;
            if !create {
                commands.extend(mapper.queue_update(data, node, state)?);
                continue;
            }
            let command = mapper.queue_create(data, node, state)?;
            match registry.parent(role) {
                Some(link) if !commands.is_empty() => commands.push(Box::new(
                    Linked::new(command).link(&link.outer_key, &link.inner_key),
                )),
                _ => commands.push(command),
            }
        }

        trace!(%entity, create, commands = commands.len(), "store command generated");
        Ok(match commands.len() {
            0 => None,
            1 => commands.pop(),
            _ => Some(Box::new(Sequence::from(commands))),
        })
    }

    /// Builds the delete of an entity from its own role's table. Rows of
    /// parent levels are the store's business.
    ///
    /// # Errors
    ///
    /// Returns an error if the heap or registry doesn't know the entity.
    pub fn generate_delete_command(
        &self,
        registry: &Registry,
        heap: &Heap,
        entity: EntityId,
    ) -> CoreResult<Box<dyn Command>> {
        let (data, node) = heap
            .entity(entity)
            .zip(heap.node(entity))
            .ok_or_else(|| CoreError::entity_not_found(entity))?;
        let state = node
            .state()
            .ok_or_else(|| CoreError::entity_not_found(entity))?;
        registry.mapper(data.role())?.queue_delete(data, node, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Entity;
    use crate::mapper::TableMapper;
    use std::sync::Arc;
    use unitflow_storage::{ForeignKey, InMemoryDatabase, TableSchema, Value};

    fn setup() -> (Arc<InMemoryDatabase>, Registry) {
        let db = InMemoryDatabase::new("default");
        db.create_table(TableSchema::new("persons", "id").generated());
        db.create_table(
            TableSchema::new("employees", "id").foreign_key(ForeignKey::new("id", "persons", "id")),
        );
        let db = Arc::new(db);
        let mut registry = Registry::new();
        registry
            .register(TableMapper::new("person", "persons", "id", db.clone()).columns(["name"]))
            .register(
                TableMapper::new("employee", "employees", "id", db.clone())
                    .columns(["salary"])
                    .generated(false),
            )
            .extend("employee", "person", "id", "id");
        (db, registry)
    }

    fn with_state(heap: &mut Heap, registry: &Registry, entity: Entity, managed: bool) -> EntityId {
        let extracted = registry.extract(&entity).unwrap();
        let id = if managed {
            heap.attach_managed(entity)
        } else {
            heap.insert(entity)
        };
        heap.node_mut(id).unwrap().get_or_init_state().overlay(extracted);
        id
    }

    #[test]
    fn new_child_role_inserts_every_level() {
        let (db, registry) = setup();
        let mut heap = Heap::new();
        let id = with_state(
            &mut heap,
            &registry,
            Entity::new("employee").with("name", "ada").with("salary", 5),
            false,
        );

        let mut command = CommandGenerator::new()
            .generate_store_command(&registry, &heap, id)
            .unwrap()
            .unwrap();
        command.execute().unwrap();

        assert_eq!(db.count("persons"), 1);
        assert_eq!(
            db.row("employees", &Value::Int(1)).unwrap().get("salary"),
            Some(&Value::Int(5))
        );
    }

    #[test]
    fn unchanged_entity_generates_nothing() {
        let (_, registry) = setup();
        let mut heap = Heap::new();
        let id = with_state(
            &mut heap,
            &registry,
            Entity::new("employee")
                .with("id", 1)
                .with("name", "ada")
                .with("salary", 5),
            true,
        );

        let command = CommandGenerator::new()
            .generate_store_command(&registry, &heap, id)
            .unwrap();
        assert!(command.is_none());
    }

    #[test]
    fn changed_level_generates_one_update() {
        let (_, registry) = setup();
        let mut heap = Heap::new();
        let id = with_state(
            &mut heap,
            &registry,
            Entity::new("employee")
                .with("id", 1)
                .with("name", "ada")
                .with("salary", 5),
            true,
        );
        heap.state_mut(id).unwrap().register("salary", Value::Int(6));

        let command = CommandGenerator::new()
            .generate_store_command(&registry, &heap, id)
            .unwrap()
            .unwrap();
        assert_eq!(command.value("salary"), Some(Value::Int(6)));
        assert_eq!(command.into_leaves().len(), 1);
    }

    #[test]
    fn missing_state_is_an_error() {
        let (_, registry) = setup();
        let mut heap = Heap::new();
        let id = heap.insert(Entity::new("person"));
        assert!(CommandGenerator::new()
            .generate_delete_command(&registry, &heap, id)
            .is_err());
    }
}
