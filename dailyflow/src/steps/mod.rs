//! Step targets and the step executor.
//!
//! A step target is the external unit of work behind a step. The orchestrator
//! only sees the narrow [`StepTarget`] interface: a request goes in, a JSON
//! result or a typed [`StepError`] comes out.

mod executor;
#[cfg(feature = "http")]
mod http;

pub use executor::{StepAttempt, StepExecutor};
#[cfg(feature = "http")]
pub use http::{HeartbeatTarget, HttpTarget, DEFAULT_USER_AGENT};

use crate::core::StepError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

/// The payload handed to a step target on every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRequest {
    /// The run this attempt belongs to.
    pub run_id: Uuid,
    /// The step name.
    pub step: String,
    /// The attempt number, counting from 1.
    pub attempt: u32,
    /// The previous step's result, absent for the first step.
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    /// Every result merged into the context so far.
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Fixed configuration of the step (e.g. a storage prefix).
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// An external unit of work invoked by a step.
///
/// Targets may be invoked more than once for the same run and step; making the
/// work idempotent is the target's responsibility.
#[async_trait]
pub trait StepTarget: Send + Sync + Debug {
    /// Invokes the target once.
    async fn invoke(&self, request: StepRequest) -> Result<serde_json::Value, StepError>;
}

/// Boxed async function used by [`FnTarget`].
pub type TargetFn =
    dyn Fn(StepRequest) -> BoxFuture<'static, Result<serde_json::Value, StepError>> + Send + Sync;

/// A target backed by an async closure.
pub struct FnTarget {
    name: String,
    func: Box<TargetFn>,
}

impl FnTarget {
    /// Creates a target from a closure returning a boxed future.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(StepRequest) -> BoxFuture<'static, Result<serde_json::Value, StepError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl Debug for FnTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTarget").field("name", &self.name).finish()
    }
}

#[async_trait]
impl StepTarget for FnTarget {
    async fn invoke(&self, request: StepRequest) -> Result<serde_json::Value, StepError> {
        (self.func)(request).await
    }
}

/// Returns the request's input unchanged, or its parameters for the first step.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTarget;

#[async_trait]
impl StepTarget for EchoTarget {
    async fn invoke(&self, request: StepRequest) -> Result<serde_json::Value, StepError> {
        Ok(request
            .input
            .unwrap_or(serde_json::Value::Object(request.parameters)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    fn request(input: Option<serde_json::Value>) -> StepRequest {
        let mut parameters = serde_json::Map::new();
        parameters.insert("prefix".into(), json!("strips"));
        StepRequest {
            run_id: Uuid::nil(),
            step: "echo".into(),
            attempt: 1,
            input,
            context: serde_json::Map::new(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_echo_returns_input() {
        let out = EchoTarget.invoke(request(Some(json!({"k": 1})))).await.unwrap();
        assert_eq!(out, json!({"k": 1}));
    }

    #[tokio::test]
    async fn test_echo_without_input_returns_parameters() {
        let out = EchoTarget.invoke(request(None)).await.unwrap();
        assert_eq!(out, json!({"prefix": "strips"}));
    }

    #[tokio::test]
    async fn test_fn_target() {
        let target = FnTarget::new("upper", |req: StepRequest| {
            async move { Ok(json!(req.step.to_uppercase())) }.boxed()
        });
        assert_eq!(target.invoke(request(None)).await.unwrap(), json!("ECHO"));
        assert!(format!("{target:?}").contains("upper"));
    }

    #[test]
    fn test_request_serialization_defaults() {
        let req: StepRequest = serde_json::from_value(json!({
            "run_id": Uuid::nil(),
            "step": "fetch",
            "attempt": 2,
        }))
        .unwrap();
        assert!(req.input.is_none());
        assert!(req.parameters.is_empty());
    }
}
