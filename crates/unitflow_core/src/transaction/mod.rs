//! Write transactions.
//!
//! This module provides:
//! - [`Pool`] - scheduling records ([`Tuple`]) and the staged visit order
//! - [`CommandGenerator`] - store/delete commands for one entity
//! - [`Runner`] - command execution and per-database transactions
//! - [`UnitOfWork`] - the loop tying them together

mod generator;
mod pool;
mod result;
mod runner;
mod tuple;
mod unit_of_work;

pub use generator::CommandGenerator;
pub use pool::Pool;
pub use result::{RunReport, RunResult};
pub use runner::Runner;
pub use tuple::{Task, TaskStatus, Tuple};
pub use unit_of_work::UnitOfWork;
