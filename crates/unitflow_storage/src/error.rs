//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    /// The table does not exist.
    #[error("table not found: {table}")]
    TableNotFound {
        /// The requested table.
        table: String,
    },

    /// A row with the same primary key already exists.
    #[error("duplicate key {key} in table {table}")]
    DuplicateKey {
        /// The table written to.
        table: String,
        /// The conflicting key value.
        key: String,
    },

    /// The primary key was neither supplied nor generated.
    #[error("missing primary key column {column} for table {table}")]
    MissingKey {
        /// The table written to.
        table: String,
        /// The primary key column.
        column: String,
    },

    /// A foreign key points at a row that does not exist.
    #[error("foreign key violation: {table}.{column} = {value} has no parent in {references}")]
    ForeignKeyViolation {
        /// The referencing table.
        table: String,
        /// The referencing column.
        column: String,
        /// The referenced table.
        references: String,
        /// The dangling value.
        value: String,
    },

    /// A row cannot be removed while restricting rows still reference it.
    #[error("row {key} of table {table} is still referenced by {referenced_by}")]
    StillReferenced {
        /// The table the row was deleted from.
        table: String,
        /// The key of the row.
        key: String,
        /// The referencing table.
        referenced_by: String,
    },

    /// Commit or rollback without an open transaction.
    #[error("no transaction open on database {database}")]
    NoTransaction {
        /// The database name.
        database: String,
    },

    /// Begin while a transaction is already open.
    #[error("transaction already open on database {database}")]
    TransactionActive {
        /// The database name.
        database: String,
    },

    /// A failure requested through failure injection.
    #[error("injected failure: {0}")]
    Injected(String),
}
