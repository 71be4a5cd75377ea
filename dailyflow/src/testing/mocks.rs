//! Step target doubles for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::core::StepError;
use crate::steps::{StepRequest, StepTarget};

/// A target that replays a fixed script of results, one per invocation.
///
/// Once the script is exhausted every further call fails with `TaskFailed`.
#[derive(Debug)]
pub struct ScriptedTarget {
    script: Mutex<VecDeque<Result<serde_json::Value, StepError>>>,
    call_count: Mutex<usize>,
}

impl ScriptedTarget {
    /// Creates a target from the results to return, in order.
    #[must_use]
    pub fn new(script: Vec<Result<serde_json::Value, StepError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            call_count: Mutex::new(0),
        }
    }

    /// Creates a target that fails `failures` times with `error`, then returns `value`.
    #[must_use]
    pub fn failing_then(failures: usize, error: &StepError, value: serde_json::Value) -> Self {
        let mut script: Vec<_> = (0..failures).map(|_| Err(error.clone())).collect();
        script.push(Ok(value));
        Self::new(script)
    }

    /// Returns the number of times the target was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl StepTarget for ScriptedTarget {
    async fn invoke(&self, _request: StepRequest) -> Result<serde_json::Value, StepError> {
        *self.call_count.lock() += 1;
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(StepError::task_failed("script exhausted")))
    }
}

/// A target that sleeps before returning a fixed value.
#[derive(Debug)]
pub struct SlowTarget {
    delay: Duration,
    value: serde_json::Value,
    call_count: Mutex<usize>,
}

impl SlowTarget {
    /// Creates a slow target.
    #[must_use]
    pub fn new(delay: Duration, value: serde_json::Value) -> Self {
        Self {
            delay,
            value,
            call_count: Mutex::new(0),
        }
    }

    /// Creates a slow target with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64, value: serde_json::Value) -> Self {
        Self::new(Duration::from_millis(ms), value)
    }

    /// Returns the number of times the target was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl StepTarget for SlowTarget {
    async fn invoke(&self, _request: StepRequest) -> Result<serde_json::Value, StepError> {
        *self.call_count.lock() += 1;
        tokio::time::sleep(self.delay).await;
        Ok(self.value.clone())
    }
}

/// A target that records every request and returns a fixed value.
#[derive(Debug)]
pub struct RecordingTarget {
    value: serde_json::Value,
    requests: Mutex<Vec<StepRequest>>,
}

impl RecordingTarget {
    /// Creates a recording target.
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns all recorded requests.
    #[must_use]
    pub fn requests(&self) -> Vec<StepRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of recorded requests.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Clears recorded requests.
    pub fn reset(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl StepTarget for RecordingTarget {
    async fn invoke(&self, request: StepRequest) -> Result<serde_json::Value, StepError> {
        self.requests.lock().push(request);
        Ok(self.value.clone())
    }
}
