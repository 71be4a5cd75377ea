//! Event sink trait and implementations.

use super::PipelineEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

/// Receives lifecycle events from runs and the scheduler.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously. Runs await this for every lifecycle event.
    async fn emit(&self, event: PipelineEvent);

    /// Emits an event without blocking, for callers outside an async context
    /// such as the scheduler's tick.
    ///
    /// Must never panic or fail the caller; delivery problems are logged.
    fn try_emit(&self, event: PipelineEvent);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: PipelineEvent) {}

    fn try_emit(&self, _event: PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &PipelineEvent) {
        let kind = event.kind.as_str();
        let step = event.step.as_deref().unwrap_or("-");
        if event.kind.is_failure() {
            warn!(
                event_type = kind,
                run_id = %event.run_id,
                pipeline = %event.pipeline,
                step,
                attempt = ?event.attempt,
                event_data = ?event.data,
                "Event: {kind}"
            );
        } else if self.level == Level::DEBUG {
            debug!(
                event_type = kind,
                run_id = %event.run_id,
                pipeline = %event.pipeline,
                step,
                attempt = ?event.attempt,
                event_data = ?event.data,
                "Event: {kind}"
            );
        } else {
            info!(
                event_type = kind,
                run_id = %event.run_id,
                pipeline = %event.pipeline,
                step,
                attempt = ?event.attempt,
                "Event: {kind}"
            );
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: PipelineEvent) {
        self.log_event(&event);
    }

    fn try_emit(&self, event: PipelineEvent) {
        self.log_event(&event);
    }
}

/// A sink that records every event, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the event type names in emission order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.read().iter().map(|e| e.kind.as_str()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type starts with the given prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind.as_str().starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }
}
