//! Ordered group of commands.

use super::Command;
use crate::error::CoreResult;
use unitflow_storage::{Row, Value};

/// Commands executed one after another, such as the per-table inserts of a
/// class hierarchy.
#[derive(Debug, Default)]
pub struct Sequence {
    commands: Vec<Box<dyn Command>>,
}

impl Sequence {
    /// Creates an empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn push(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    /// Returns the number of direct children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if the sequence holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns the direct children.
    pub fn commands(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.iter().map(|c| c.as_ref())
    }
}

impl From<Vec<Box<dyn Command>>> for Sequence {
    fn from(commands: Vec<Box<dyn Command>>) -> Self {
        Self { commands }
    }
}

impl Command for Sequence {
    fn is_ready(&self) -> bool {
        self.commands.first().map_or(true, |c| c.is_ready())
    }

    fn is_executed(&self) -> bool {
        self.commands.iter().all(|c| c.is_executed())
    }

    /// Executes the children in order outside of a runner, applying each
    /// child's pre-execution hook.
    fn execute(&mut self) -> CoreResult<()> {
        for i in 0..self.commands.len() {
            let (done, rest) = self.commands.split_at_mut(i);
            let command = &mut rest[0];
            if command.is_executed() {
                continue;
            }
            command.before_execute(done.last().map(|c| c.as_ref()))?;
            command.execute()?;
        }
        Ok(())
    }

    fn complete(&mut self) {
        for command in &mut self.commands {
            command.complete();
        }
    }

    fn rollback(&mut self) {
        for command in self.commands.iter_mut().rev() {
            command.rollback();
        }
    }

    fn value(&self, column: &str) -> Option<Value> {
        self.commands.iter().rev().find_map(|c| c.value(column))
    }

    fn output(&self) -> Row {
        let mut output = Row::new();
        for command in &self.commands {
            output.extend(command.output());
        }
        output
    }

    fn into_leaves(self: Box<Self>) -> Vec<Box<dyn Command>> {
        self.commands
            .into_iter()
            .flat_map(|c| c.into_leaves())
            .collect()
    }
}
