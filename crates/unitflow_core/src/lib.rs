//! # UnitFlow Core
//!
//! Write-path unit of work engine for UnitFlow.
//!
//! This crate provides:
//! - Heap (identity map) of entities with persisted and transactional state
//! - Relation resolvers that decide when an entity may be written
//! - A staged scheduler that orders inserts, updates and deletes
//! - Command generation, including joined-table class hierarchies
//! - A runner committing or rolling back every database it touched

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod config;
mod error;
mod heap;
mod mapper;
mod registry;
mod relation;
mod transaction;

pub use command::{Command, Delete, Insert, Linked, Sequence, Update};
pub use config::{Config, TransactionMode};
pub use error::{CoreError, CoreResult, Unresolved};
pub use heap::{Entity, EntityId, Heap, Node, NodeStatus, Related, State};
pub use mapper::{Mapper, TableMapper};
pub use registry::{ParentLink, Registry, RelationMap};
pub use relation::{
    BelongsTo, Embedded, HasMany, HasOne, Relation, RelationStatus, Scope, ShadowBelongsTo,
};
pub use transaction::{
    CommandGenerator, Pool, RunReport, RunResult, Runner, Task, TaskStatus, Tuple, UnitOfWork,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
