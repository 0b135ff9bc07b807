//! # UnitFlow Storage
//!
//! Transactional resource contract and an in-memory relational store.
//!
//! This crate provides the lowest-level storage abstraction for UnitFlow.
//! A [`Database`] accepts single-row data commands (insert, update, delete)
//! and exposes begin/commit/rollback so that one logical unit of work can
//! span several independent resources.
//!
//! ## Design Principles
//!
//! - Databases know tables, keys and foreign keys, nothing about entities
//! - Every statement is atomic: it either fully applies or leaves no trace
//! - Must be `Send + Sync` so commands can hold shared handles
//! - Referential actions (`Cascade`, `SetNull`) are the store's job
//!
//! ## Available Databases
//!
//! - [`InMemoryDatabase`] - For testing, scenarios and ephemeral data
//!
//! ## Example
//!
//! ```rust
//! use unitflow_storage::{Database, InMemoryDatabase, Row, TableSchema, Value};
//!
//! let db = InMemoryDatabase::new("default");
//! db.create_table(TableSchema::new("users", "id").generated());
//!
//! let mut row = Row::new();
//! row.insert("name".to_string(), Value::from("ada"));
//! let key = db.insert("users", &row).unwrap();
//! assert_eq!(key, Some(Value::Int(1)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod database;
mod error;
mod memory;
mod schema;
mod statement;
mod value;

pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryDatabase;
pub use schema::{ForeignKey, OnDelete, TableSchema};
pub use statement::{Statement, StatementKind};
pub use value::{Row, Value};
