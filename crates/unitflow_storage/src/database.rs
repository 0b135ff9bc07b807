//! Transactional resource trait definition.

use crate::error::StorageResult;
use crate::value::{Row, Value};
use std::fmt;

/// A transactional resource accepting single-table data statements.
///
/// Several databases can take part in one unit of work. Each one is begun on
/// first use and committed or rolled back independently; there is no
/// two-phase protocol between them.
///
/// # Invariants
///
/// - `insert` returns the key it generated, or `None` when the caller supplied one
/// - a failing statement leaves no partial effect behind
/// - `rollback` restores the state observed by `begin`
/// - implementations must be `Send + Sync`; commands share them through `Arc`
pub trait Database: Send + Sync + fmt::Debug {
    /// Returns the name identifying this resource within a unit of work.
    fn name(&self) -> &str;

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open.
    fn begin(&self) -> StorageResult<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn commit(&self) -> StorageResult<()>;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&self) -> StorageResult<()>;

    /// Returns true while a transaction is open.
    fn in_transaction(&self) -> bool;

    /// Inserts one row into `table`.
    ///
    /// Returns the generated primary key when the store produced one.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown tables, duplicate or missing keys and
    /// dangling foreign keys.
    fn insert(&self, table: &str, values: &Row) -> StorageResult<Option<Value>>;

    /// Updates every row of `table` matching `scope` with `values`.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown tables and dangling foreign keys.
    fn update(&self, table: &str, scope: &Row, values: &Row) -> StorageResult<usize>;

    /// Deletes every row of `table` matching `scope`, applying referential actions.
    ///
    /// Returns the number of rows removed from `table` itself.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown tables or when a restricting reference remains.
    fn delete(&self, table: &str, scope: &Row) -> StorageResult<usize>;

    /// Returns every row of `table` matching `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown tables.
    fn fetch(&self, table: &str, scope: &Row) -> StorageResult<Vec<Row>>;
}
