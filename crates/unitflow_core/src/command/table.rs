//! Single-row table commands.

use super::Command;
use crate::error::CoreResult;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use unitflow_storage::{Database, Row, Value};

/// Inserts one row.
///
/// The output holds the primary key: the one the database generated, or the
/// one supplied in the values.
pub struct Insert {
    database: Arc<dyn Database>,
    table: String,
    primary_key: String,
    values: Row,
    required: Vec<String>,
    output: Row,
    executed: bool,
}

impl Insert {
    /// Creates an insert.
    pub fn new(
        database: Arc<dyn Database>,
        table: impl Into<String>,
        primary_key: impl Into<String>,
        values: Row,
    ) -> Self {
        Self {
            database,
            table: table.into(),
            primary_key: primary_key.into(),
            values,
            required: Vec::new(),
            output: Row::new(),
            executed: false,
        }
    }

    /// Declares a column that must be non-null before execution.
    #[must_use]
    pub fn require(mut self, column: impl Into<String>) -> Self {
        self.required.push(column.into());
        self
    }

    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the values to insert.
    #[must_use]
    pub fn values(&self) -> &Row {
        &self.values
    }
}

impl fmt::Debug for Insert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Insert")
            .field("database", &self.database.name())
            .field("table", &self.table)
            .field("values", &self.values)
            .field("executed", &self.executed)
            .finish()
    }
}

impl Command for Insert {
    fn database(&self) -> Option<Arc<dyn Database>> {
        Some(Arc::clone(&self.database))
    }

    fn is_ready(&self) -> bool {
        self.required
            .iter()
            .all(|c| self.values.get(c).is_some_and(|v| !v.is_null()))
    }

    fn is_executed(&self) -> bool {
        self.executed
    }

    fn execute(&mut self) -> CoreResult<()> {
        let generated = self.database.insert(&self.table, &self.values)?;
        let key = generated
            .or_else(|| self.values.get(&self.primary_key).cloned())
            .unwrap_or_default();
        trace!(table = %self.table, key = %key, "row inserted");
        self.output.insert(self.primary_key.clone(), key);
        self.executed = true;
        Ok(())
    }

    fn rollback(&mut self) {
        self.output.clear();
        self.executed = false;
    }

    fn value(&self, column: &str) -> Option<Value> {
        self.output
            .get(column)
            .or_else(|| self.values.get(column))
            .cloned()
    }

    fn set_value(&mut self, column: &str, value: Value) {
        self.values.insert(column.to_string(), value);
    }

    fn output(&self) -> Row {
        self.output.clone()
    }

    fn into_leaves(self: Box<Self>) -> Vec<Box<dyn Command>> {
        vec![self]
    }
}

/// Updates the rows matching a scope.
pub struct Update {
    database: Arc<dyn Database>,
    table: String,
    scope: Row,
    values: Row,
    executed: bool,
}

impl Update {
    /// Creates an update.
    pub fn new(database: Arc<dyn Database>, table: impl Into<String>, scope: Row, values: Row) -> Self {
        Self {
            database,
            table: table.into(),
            scope,
            values,
            executed: false,
        }
    }

    /// Returns the changed values.
    #[must_use]
    pub fn values(&self) -> &Row {
        &self.values
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("database", &self.database.name())
            .field("table", &self.table)
            .field("scope", &self.scope)
            .field("values", &self.values)
            .finish()
    }
}

impl Command for Update {
    fn database(&self) -> Option<Arc<dyn Database>> {
        Some(Arc::clone(&self.database))
    }

    fn is_ready(&self) -> bool {
        !self.scope.is_empty() && self.scope.values().all(|v| !v.is_null())
    }

    fn is_executed(&self) -> bool {
        self.executed
    }

    fn execute(&mut self) -> CoreResult<()> {
        let count = self.database.update(&self.table, &self.scope, &self.values)?;
        trace!(table = %self.table, count, "rows updated");
        self.executed = true;
        Ok(())
    }

    fn rollback(&mut self) {
        self.executed = false;
    }

    fn value(&self, column: &str) -> Option<Value> {
        self.values
            .get(column)
            .or_else(|| self.scope.get(column))
            .cloned()
    }

    fn set_value(&mut self, column: &str, value: Value) {
        self.values.insert(column.to_string(), value);
    }

    fn into_leaves(self: Box<Self>) -> Vec<Box<dyn Command>> {
        vec![self]
    }
}

/// Deletes the rows matching a scope.
pub struct Delete {
    database: Arc<dyn Database>,
    table: String,
    scope: Row,
    executed: bool,
}

impl Delete {
    /// Creates a delete.
    pub fn new(database: Arc<dyn Database>, table: impl Into<String>, scope: Row) -> Self {
        Self {
            database,
            table: table.into(),
            scope,
            executed: false,
        }
    }
}

impl fmt::Debug for Delete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delete")
            .field("database", &self.database.name())
            .field("table", &self.table)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Command for Delete {
    fn database(&self) -> Option<Arc<dyn Database>> {
        Some(Arc::clone(&self.database))
    }

    fn is_ready(&self) -> bool {
        !self.scope.is_empty() && self.scope.values().all(|v| !v.is_null())
    }

    fn is_executed(&self) -> bool {
        self.executed
    }

    fn execute(&mut self) -> CoreResult<()> {
        let count = self.database.delete(&self.table, &self.scope)?;
        trace!(table = %self.table, count, "rows deleted");
        self.executed = true;
        Ok(())
    }

    fn rollback(&mut self) {
        self.executed = false;
    }

    fn value(&self, column: &str) -> Option<Value> {
        self.scope.get(column).cloned()
    }

    fn into_leaves(self: Box<Self>) -> Vec<Box<dyn Command>> {
        vec![self]
    }
}
