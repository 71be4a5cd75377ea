//! Testing utilities for dailyflow pipelines.
//!
//! This module provides:
//! - Step target doubles
//! - Assertions over run outcomes

mod assertions;
mod mocks;

pub use assertions::{
    assert_context_fields, assert_context_value, assert_failed_at, assert_run_failed,
    assert_run_succeeded,
};
pub use mocks::{RecordingTarget, ScriptedTarget, SlowTarget};
