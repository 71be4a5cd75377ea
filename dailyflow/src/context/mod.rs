//! Context management for pipeline runs.
//!
//! This module provides:
//! - The ordered per-run execution context
//! - Run identity (run ID, trigger, creation time)

mod execution;
mod identity;

pub use execution::ExecutionContext;
pub use identity::RunIdentity;
