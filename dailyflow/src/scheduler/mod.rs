//! Recurring trigger that starts independent pipeline runs.
//!
//! Firing is fire-and-forget: every tick spawns a fresh run on the tokio
//! runtime, whether or not earlier runs have finished. A tick missed while the
//! process was down is skipped, never replayed.

mod trigger;

pub use trigger::Trigger;

use crate::context::RunIdentity;
use crate::events::{EventKind, PipelineEvent};
use crate::pipeline::{Orchestrator, RunOutcome};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Source of the current UTC time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fires pipeline runs on a [`Trigger`].
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    trigger: Trigger,
    outcomes: Option<mpsc::UnboundedSender<RunOutcome>>,
    clock: Clock,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("orchestrator", &self.orchestrator)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler for the orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, trigger: Trigger) -> Self {
        Self {
            orchestrator,
            trigger,
            outcomes: None,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Forwards every run's outcome to `sender`.
    #[must_use]
    pub fn with_outcomes(mut self, sender: mpsc::UnboundedSender<RunOutcome>) -> Self {
        self.outcomes = Some(sender);
        self
    }

    /// Returns the trigger.
    #[must_use]
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Returns the next tick after `now`, never at or before `last_fired`.
    #[must_use]
    pub fn next_fire(
        &self,
        last_fired: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let floor = last_fired.map_or(now, |last| last.max(now));
        self.trigger.next_after(floor)
    }

    /// Starts a run for the tick at `at` and returns without waiting for it.
    pub fn fire(&self, at: DateTime<Utc>) -> JoinHandle<RunOutcome> {
        let identity = RunIdentity::scheduled(self.orchestrator.definition().name(), at);
        info!(pipeline = %identity.pipeline, run_id = %identity.run_id, tick = %at, "Schedule fired");
        self.orchestrator.event_sink().try_emit(
            PipelineEvent::new(EventKind::ScheduleFired, identity.run_id, &identity.pipeline)
                .with_data(serde_json::json!({ "tick": at })),
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let outcome = orchestrator.run_with(identity).await;
            if let Some(sender) = outcomes {
                if sender.send(outcome.clone()).is_err() {
                    debug!("Outcome receiver dropped");
                }
            }
            outcome
        })
    }

    /// Fires runs on every tick until `shutdown` resolves.
    ///
    /// Runs already started keep going after shutdown; their handles are
    /// detached.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut last_fired: Option<DateTime<Utc>> = None;
        info!(trigger = %self.trigger, "Scheduler started");

        loop {
            let now = (self.clock)();
            let Some(next) = self.next_fire(last_fired, now) else {
                warn!(trigger = %self.trigger, "Trigger has no further ticks");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, wait_secs = wait.as_secs(), "Waiting for next tick");

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    drop(self.fire(next));
                    last_fired = Some(next);
                }
                () = &mut shutdown => {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }
}
