//! Integration test harness.
//!
//! Bundles a [`Schema`] with a heap and offers shortcuts for running units
//! of work and inspecting the statements they produced.

use crate::fixtures::Schema;
use unitflow_core::{Config, Entity, EntityId, Heap, RunResult, UnitOfWork};
use unitflow_storage::{Statement, StatementKind, Value};

/// A schema, a heap and a unit of work configuration.
pub struct Harness {
    /// The schema under test.
    pub schema: Schema,
    /// Entities under test.
    pub heap: Heap,
    config: Config,
}

impl Harness {
    /// Creates a harness with an empty heap.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            heap: Heap::new(),
            config: Config::default(),
        }
    }

    /// Sets the configuration used by [`uow`](Self::uow).
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Adds a new entity.
    pub fn insert(&mut self, entity: Entity) -> EntityId {
        self.heap.insert(entity)
    }

    /// Adds an entity as if loaded from the store.
    pub fn managed(&mut self, entity: Entity) -> EntityId {
        self.heap.attach_managed(entity)
    }

    /// Returns an entity.
    pub fn entity(&self, id: EntityId) -> &Entity {
        self.heap.entity(id).expect("entity not in heap")
    }

    /// Returns an entity mutably.
    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        self.heap.entity_mut(id).expect("entity not in heap")
    }

    /// Returns a field of an entity, `Null` if missing.
    pub fn field(&self, id: EntityId, field: &str) -> Value {
        self.entity(id).get(field).cloned().unwrap_or_default()
    }

    /// Opens a unit of work over the harness heap.
    pub fn uow(&mut self) -> UnitOfWork<'_> {
        UnitOfWork::with_config(&mut self.heap, &self.schema.registry, self.config.clone())
    }

    /// Persists the given entities with cascade in one unit of work.
    pub fn persist(&mut self, ids: &[EntityId]) -> RunResult {
        let mut uow = self.uow();
        for id in ids {
            uow.persist(*id, true).expect("persist failed");
        }
        uow.run()
    }

    /// Deletes the given entities in one unit of work.
    pub fn delete(&mut self, ids: &[EntityId], cascade: bool) -> RunResult {
        let mut uow = self.uow();
        for id in ids {
            uow.delete(*id, cascade).expect("delete failed");
        }
        uow.run()
    }

    /// Every journaled statement, database by database.
    pub fn statements(&self) -> Vec<Statement> {
        self.schema
            .databases
            .iter()
            .flat_map(|db| db.statements())
            .collect()
    }

    /// Journaled insert, update and delete statements, database by database.
    pub fn data_statements(&self) -> Vec<Statement> {
        self.schema
            .databases
            .iter()
            .flat_map(|db| db.data_statements())
            .collect()
    }

    /// Forgets journaled statements.
    pub fn clear_statements(&self) {
        for db in &self.schema.databases {
            db.clear_statements();
        }
    }

    /// `(kind, table)` of every data statement, in order.
    pub fn trace(&self) -> Vec<(StatementKind, String)> {
        self.data_statements()
            .into_iter()
            .map(|s| (s.kind, s.table.unwrap_or_default()))
            .collect()
    }

    /// Index of the first data statement of `kind` on `table` whose values
    /// or scope contain `column = value`.
    pub fn position(&self, kind: StatementKind, table: &str, column: &str, value: &Value) -> Option<usize> {
        self.data_statements().iter().position(|s| {
            s.kind == kind
                && s.table.as_deref() == Some(table)
                && (s.values.get(column) == Some(value) || s.scope.get(column) == Some(value))
        })
    }

    /// Counts data statements of `kind` on `table`.
    pub fn count(&self, kind: StatementKind, table: &str) -> usize {
        self.data_statements()
            .iter()
            .filter(|s| s.kind == kind && s.table.as_deref() == Some(table))
            .count()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(crate::fixtures::blog())
    }
}
