//! Statement journal entries.

use crate::value::Row;
use serde::Serialize;
use std::fmt;

/// Kind of a journaled statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// Transaction begin.
    Begin,
    /// Transaction commit.
    Commit,
    /// Transaction rollback.
    Rollback,
    /// Row insert.
    Insert,
    /// Row update.
    Update,
    /// Row delete.
    Delete,
}

impl StatementKind {
    /// Returns true for insert, update and delete.
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }
}

/// A statement accepted by a database.
///
/// Only statements that succeeded are journaled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    /// Database that accepted the statement.
    pub database: String,
    /// Statement kind.
    pub kind: StatementKind,
    /// Target table (data statements only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Written values; for inserts this includes the generated key.
    #[serde(skip_serializing_if = "Row::is_empty")]
    pub values: Row,
    /// Row selector for updates and deletes.
    #[serde(skip_serializing_if = "Row::is_empty")]
    pub scope: Row,
}

impl Statement {
    pub(crate) fn control(database: &str, kind: StatementKind) -> Self {
        Self {
            database: database.to_string(),
            kind,
            table: None,
            values: Row::new(),
            scope: Row::new(),
        }
    }

    pub(crate) fn data(
        database: &str,
        kind: StatementKind,
        table: &str,
        values: Row,
        scope: Row,
    ) -> Self {
        Self {
            database: database.to_string(),
            kind,
            table: Some(table.to_string()),
            values,
            scope,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs = |row: &Row| {
            row.iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        match (self.kind, &self.table) {
            (StatementKind::Insert, Some(table)) => {
                write!(f, "[{}] INSERT {table} ({})", self.database, pairs(&self.values))
            }
            (StatementKind::Update, Some(table)) => write!(
                f,
                "[{}] UPDATE {table} SET {} WHERE {}",
                self.database,
                pairs(&self.values),
                pairs(&self.scope)
            ),
            (StatementKind::Delete, Some(table)) => write!(
                f,
                "[{}] DELETE {table} WHERE {}",
                self.database,
                pairs(&self.scope)
            ),
            (kind, _) => write!(f, "[{}] {kind:?}", self.database),
        }
    }
}
