//! Command that takes key values from the command before it.

use super::Command;
use crate::error::{CoreError, CoreResult};
use std::sync::Arc;
use unitflow_storage::{Database, Row, Value};

/// Wraps a child-table command of a class hierarchy. Right before it runs,
/// each `(from, to)` link copies `from` of the previous command into `to`.
#[derive(Debug)]
pub struct Linked {
    inner: Box<dyn Command>,
    links: Vec<(String, String)>,
}

impl Linked {
    /// Wraps a command without links.
    pub fn new(inner: Box<dyn Command>) -> Self {
        Self {
            inner,
            links: Vec::new(),
        }
    }

    /// Copies the previous command's `from` value into `to`.
    #[must_use]
    pub fn link(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.links.push((from.into(), to.into()));
        self
    }

    /// Returns the wrapped command.
    #[must_use]
    pub fn inner(&self) -> &dyn Command {
        self.inner.as_ref()
    }
}

impl Command for Linked {
    fn database(&self) -> Option<Arc<dyn Database>> {
        self.inner.database()
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn is_executed(&self) -> bool {
        self.inner.is_executed()
    }

    fn execute(&mut self) -> CoreResult<()> {
        self.inner.execute()
    }

    fn complete(&mut self) {
        self.inner.complete();
    }

    fn rollback(&mut self) {
        self.inner.rollback();
    }

    fn value(&self, column: &str) -> Option<Value> {
        self.inner.value(column)
    }

    fn set_value(&mut self, column: &str, value: Value) {
        self.inner.set_value(column, value);
    }

    fn output(&self) -> Row {
        self.inner.output()
    }

    fn before_execute(&mut self, previous: Option<&dyn Command>) -> CoreResult<()> {
        let Some(previous) = previous else {
            return Err(CoreError::command_not_ready(format!(
                "{:?} has no preceding command to take keys from",
                self.inner
            )));
        };
        for (from, to) in &self.links {
            if let Some(value) = previous.value(from).filter(|v| !v.is_null()) {
                self.inner.set_value(to, value);
            }
        }
        self.inner.before_execute(Some(previous))
    }

    fn into_leaves(self: Box<Self>) -> Vec<Box<dyn Command>> {
        vec![self]
    }
}
