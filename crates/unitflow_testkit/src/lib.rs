//! # UnitFlow Testkit
//!
//! Test utilities for UnitFlow.
//!
//! This crate provides:
//! - Fixture schemas over in-memory databases
//! - A harness running units of work and inspecting their statements
//! - Property-based test generators using proptest
//! - Named end-to-end scenarios replayed by the CLI
//!
//! ## Usage
//!
//! ```rust
//! use unitflow_core::Entity;
//! use unitflow_testkit::prelude::*;
//!
//! let mut harness = Harness::new(blog());
//! let user = harness.insert(Entity::new("user").with("name", "ada"));
//! assert!(harness.persist(&[user]).is_success());
//! assert_eq!(harness.schema.database().count("users"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod scenarios;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::scenarios::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
pub use scenarios::*;
