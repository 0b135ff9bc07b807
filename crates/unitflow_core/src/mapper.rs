//! Entity to row mapping.

use crate::command::{Command, Delete, Insert, Update};
use crate::error::CoreResult;
use crate::heap::{Entity, Node, Related, State};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use unitflow_storage::{Database, Row, Value};

/// Translates entities of one role into commands and back.
///
/// In a class hierarchy every level has its own mapper handling only its own
/// columns.
pub trait Mapper: fmt::Debug + Send + Sync {
    /// The role this mapper handles.
    fn role(&self) -> &str;

    /// The primary key field.
    fn primary_key(&self) -> &str;

    /// Builds the insert for a new entity.
    ///
    /// # Errors
    ///
    /// Returns an error when the state can't be written.
    fn queue_create(&self, entity: &Entity, node: &Node, state: &State) -> CoreResult<Box<dyn Command>>;

    /// Builds the update for a stored entity, `None` when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error when the state can't be written.
    fn queue_update(
        &self,
        entity: &Entity,
        node: &Node,
        state: &State,
    ) -> CoreResult<Option<Box<dyn Command>>>;

    /// Builds the delete of a stored entity.
    ///
    /// # Errors
    ///
    /// Returns an error when the entity has no key.
    fn queue_delete(&self, entity: &Entity, node: &Node, state: &State) -> CoreResult<Box<dyn Command>>;

    /// Returns the relation values the scheduler should resolve.
    fn fetch_relations(&self, entity: &Entity) -> BTreeMap<String, Related> {
        entity.relations().clone()
    }

    /// Writes stored values back into the entity.
    fn hydrate(&self, entity: &mut Entity, data: &Row);

    /// Reads the columns this mapper owns out of the entity.
    fn extract(&self, entity: &Entity) -> Row;
}

/// Maps a role onto one table of one database.
#[derive(Clone)]
pub struct TableMapper {
    role: String,
    table: String,
    primary_key: String,
    columns: Vec<String>,
    generated: bool,
    database: Arc<dyn Database>,
}

impl TableMapper {
    /// Creates a mapper owning every field of the entity. The primary key is
    /// generated by the database.
    pub fn new(
        role: impl Into<String>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
        database: Arc<dyn Database>,
    ) -> Self {
        Self {
            role: role.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            columns: Vec::new(),
            generated: true,
            database,
        }
    }

    /// Restricts the mapper to the given columns (plus the primary key).
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether the database generates the primary key. Tables of child
    /// levels in a class hierarchy take their key from the parent level.
    #[must_use]
    pub fn generated(mut self, generated: bool) -> Self {
        self.generated = generated;
        self
    }

    /// Returns the table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn owns(&self, column: &str) -> bool {
        self.columns.is_empty() || column == self.primary_key || self.columns.iter().any(|c| c == column)
    }

    fn own(&self, row: &Row) -> Row {
        row.iter()
            .filter(|(column, _)| self.owns(column))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    fn scope(&self, node: &Node) -> Row {
        let key = node
            .data()
            .get(&self.primary_key)
            .filter(|v| !v.is_null())
            .or_else(|| node.value(&self.primary_key))
            .cloned()
            .unwrap_or_default();
        let mut scope = Row::new();
        scope.insert(self.primary_key.clone(), key);
        scope
    }
}

impl fmt::Debug for TableMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMapper")
            .field("role", &self.role)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("columns", &self.columns)
            .field("database", &self.database.name())
            .finish()
    }
}

impl Mapper for TableMapper {
    fn role(&self) -> &str {
        &self.role
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn queue_create(&self, _entity: &Entity, _node: &Node, state: &State) -> CoreResult<Box<dyn Command>> {
        let mut values = self.own(state.data());
        for field in state.waiting() {
            if self.owns(field) {
                values.insert(field.clone(), Value::Null);
            }
        }
        let mut insert = Insert::new(
            Arc::clone(&self.database),
            &self.table,
            &self.primary_key,
            values,
        );
        if !self.generated {
            insert = insert.require(&self.primary_key);
        }
        Ok(Box::new(insert))
    }

    fn queue_update(
        &self,
        _entity: &Entity,
        node: &Node,
        state: &State,
    ) -> CoreResult<Option<Box<dyn Command>>> {
        let mut changes = self.own(&state.changes(node.data()));
        changes.remove(&self.primary_key);
        if changes.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(Update::new(
            Arc::clone(&self.database),
            &self.table,
            self.scope(node),
            changes,
        ))))
    }

    fn queue_delete(&self, _entity: &Entity, node: &Node, _state: &State) -> CoreResult<Box<dyn Command>> {
        Ok(Box::new(Delete::new(
            Arc::clone(&self.database),
            &self.table,
            self.scope(node),
        )))
    }

    fn hydrate(&self, entity: &mut Entity, data: &Row) {
        for (column, value) in self.own(data) {
            entity.set(column, value);
        }
    }

    fn extract(&self, entity: &Entity) -> Row {
        self.own(entity.fields())
    }
}
