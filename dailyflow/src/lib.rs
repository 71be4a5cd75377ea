//! # Dailyflow
//!
//! A scheduled, sequential step pipeline orchestrator.
//!
//! Dailyflow runs a fixed list of external steps in order, once a day or on a
//! cron schedule, with support for:
//!
//! - **Context threading**: each step's result is merged under its own field
//!   and handed to the next step
//! - **Retry with backoff**: bounded exponential backoff on declared failure kinds
//! - **Timeouts**: per-attempt and whole-run deadlines
//! - **Fire-and-forget scheduling**: every tick is an independent run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dailyflow::prelude::*;
//!
//! let definition = PipelineBuilder::new("dilbert-feed")
//!     .step(StepDefinition::new("GetStrip", "strip", get_strip).with_retry(RetryPolicy::default()))?
//!     .step(StepDefinition::new("GenFeed", "feed", gen_feed))?
//!     .build()?;
//!
//! let outcome = Orchestrator::new(definition).run().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod scheduler;
pub mod steps;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::context::{ExecutionContext, RunIdentity};
    pub use crate::core::{FailureKind, RunState, StepError, TriggerKind};
    pub use crate::errors::{
        ContractErrorInfo, DailyflowError, DataConflictError, PipelineValidationError, StoreError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        Orchestrator, PipelineBuilder, PipelineDefinition, RetryPolicy, RunOutcome, StepDefaults,
        StepDefinition,
    };
    pub use crate::scheduler::{Scheduler, Trigger};
    pub use crate::steps::{EchoTarget, FnTarget, StepRequest, StepTarget};
    pub use crate::store::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore, RetentionRule};
}
