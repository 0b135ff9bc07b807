//! Executable write commands.
//!
//! Mappers turn entity state into commands; the runner flattens them into
//! leaves and executes each leaf against its database. Composite commands
//! ([`Sequence`], [`Linked`]) only exist to keep related leaves together.

mod linked;
mod sequence;
mod table;

pub use linked::Linked;
pub use sequence::Sequence;
pub use table::{Delete, Insert, Update};

use crate::error::CoreResult;
use std::fmt;
use std::sync::Arc;
use unitflow_storage::{Database, Row, Value};

/// A unit of executable work.
pub trait Command: fmt::Debug {
    /// Database the command writes to. `None` for commands that don't
    /// touch storage.
    fn database(&self) -> Option<Arc<dyn Database>> {
        None
    }

    /// Whether every value the command needs is known.
    fn is_ready(&self) -> bool {
        true
    }

    /// Whether the command already ran.
    fn is_executed(&self) -> bool;

    /// Runs the command.
    ///
    /// # Errors
    ///
    /// Returns the storage error that made the write fail.
    fn execute(&mut self) -> CoreResult<()>;

    /// Hook invoked after every database committed.
    fn complete(&mut self) {}

    /// Hook invoked after the databases rolled back.
    fn rollback(&mut self) {}

    /// Returns a value the command writes or produced.
    fn value(&self, _column: &str) -> Option<Value> {
        None
    }

    /// Overrides a value the command writes.
    fn set_value(&mut self, _column: &str, _value: Value) {}

    /// Values produced by execution, such as generated keys.
    fn output(&self) -> Row {
        Row::new()
    }

    /// Called by the runner right before execution with the leaf executed
    /// just before this one.
    ///
    /// # Errors
    ///
    /// Returns an error if the command can't use what `previous` produced.
    fn before_execute(&mut self, _previous: Option<&dyn Command>) -> CoreResult<()> {
        Ok(())
    }

    /// Splits the command into the leaves the runner executes, in order.
    fn into_leaves(self: Box<Self>) -> Vec<Box<dyn Command>>;
}
