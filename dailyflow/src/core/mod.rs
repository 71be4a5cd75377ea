//! Core domain model types for dailyflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Failure kinds and typed step errors
//! - Run state and trigger kind enums

mod failure;
mod status;

pub use failure::{FailureKind, StepError};
pub use status::{RunState, TriggerKind};
