//! Whole-pipeline scenarios.

use crate::context::RunIdentity;
use crate::core::{FailureKind, StepError};
use crate::events::CollectingEventSink;
use crate::pipeline::{
    FailureScope, Orchestrator, PipelineBuilder, PipelineDefinition, RetryPolicy, StepDefinition,
};
use crate::steps::{FnTarget, StepTarget};
use crate::testing::{
    assert_context_fields, assert_context_value, assert_failed_at, assert_run_failed,
    assert_run_succeeded, RecordingTarget, ScriptedTarget, SlowTarget,
};
use futures::FutureExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn feed_retry() -> RetryPolicy {
    RetryPolicy::new()
        .with_retriable([FailureKind::TaskFailed])
        .with_interval(Duration::from_secs(10))
        .with_max_attempts(2)
        .with_backoff_rate(2.0)
}

fn three_steps(
    strip: Arc<dyn StepTarget>,
    feed: Arc<dyn StepTarget>,
    heartbeat: Arc<dyn StepTarget>,
) -> PipelineDefinition {
    PipelineBuilder::new("dilbert-feed")
        .step(StepDefinition::new("GetStrip", "strip", strip).with_retry(feed_retry()))
        .unwrap()
        .step(StepDefinition::new("GenFeed", "feed", feed).with_retry(feed_retry()))
        .unwrap()
        .step(StepDefinition::new("SendHeartbeat", "heartbeat", heartbeat).with_retry(feed_retry()))
        .unwrap()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_all_success_context_has_one_field_per_step_in_order() {
    let pipeline = Orchestrator::new(three_steps(
        Arc::new(RecordingTarget::new(json!({"key": "strips/2026-10-18.gif"}))),
        Arc::new(RecordingTarget::new(json!({"key": "feed/dilbert.xml"}))),
        Arc::new(RecordingTarget::new(json!({"status": 200}))),
    ));

    let outcome = pipeline.run().await;

    assert_context_fields(&outcome, &["strip", "feed", "heartbeat"]);
    assert_context_value(&outcome, "heartbeat", &json!({"status": 200}));
}

#[tokio::test]
async fn test_each_step_receives_prior_result() {
    let feed = Arc::new(RecordingTarget::new(json!("feed")));
    let heartbeat = Arc::new(RecordingTarget::new(json!("beat")));
    let pipeline = Orchestrator::new(three_steps(
        Arc::new(RecordingTarget::new(json!({"key": "a"}))),
        feed.clone(),
        heartbeat.clone(),
    ));

    assert_run_succeeded(&pipeline.run().await);

    let feed_request = &feed.requests()[0];
    assert_eq!(feed_request.input, Some(json!({"key": "a"})));
    assert_eq!(feed_request.context.len(), 1);

    let heartbeat_request = &heartbeat.requests()[0];
    assert_eq!(heartbeat_request.input, Some(json!("feed")));
    assert_eq!(heartbeat_request.context.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_step_fails_once_then_succeeds() {
    let flaky = Arc::new(ScriptedTarget::failing_then(
        1,
        &StepError::task_failed("Lambda.Unknown"),
        json!({"key": "feed/dilbert.xml"}),
    ));
    let pipeline = Orchestrator::new(three_steps(
        Arc::new(RecordingTarget::new(json!({"key": "a"}))),
        flaky.clone(),
        Arc::new(RecordingTarget::new(json!({"status": 200}))),
    ));

    let started = Instant::now();
    let outcome = pipeline.run().await;

    assert_run_succeeded(&outcome);
    assert_eq!(flaky.call_count(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_step_fails_twice_fails_pipeline_with_two_attempts() {
    let failing = Arc::new(ScriptedTarget::new(vec![
        Err(StepError::task_failed("first")),
        Err(StepError::task_failed("second")),
    ]));
    let pipeline = Orchestrator::new(three_steps(
        failing,
        Arc::new(RecordingTarget::new(json!(null))),
        Arc::new(RecordingTarget::new(json!(null))),
    ));

    let outcome = pipeline.run().await;

    assert_failed_at(&outcome, "GetStrip", &FailureKind::TaskFailed);
    let failure = assert_run_failed(&outcome);
    assert_eq!(failure.attempts, 2);
    assert_eq!(failure.message, "second");
    assert_eq!(failure.scope, FailureScope::Step);
}

#[tokio::test(start_paused = true)]
async fn test_non_retriable_kind_fails_on_first_attempt() {
    let target = Arc::new(ScriptedTarget::new(vec![Err(StepError::new(
        FailureKind::Other("States.Permissions".into()),
        "denied",
    ))]));
    let definition = PipelineDefinition::new(
        "feed",
        vec![StepDefinition::new("GetStrip", "strip", target.clone())
            .with_retry(feed_retry().with_max_attempts(10))],
        Duration::from_secs(60),
    )
    .unwrap();

    let started = Instant::now();
    let outcome = Orchestrator::new(definition).run().await;

    let failure = assert_run_failed(&outcome);
    assert_eq!(failure.attempts, 1);
    assert_eq!(target.call_count(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_failure_at_step_two_skips_step_three() {
    let heartbeat = Arc::new(RecordingTarget::new(json!({"status": 200})));
    let definition = PipelineBuilder::new("feed")
        .step(StepDefinition::new(
            "GetStrip",
            "strip",
            Arc::new(RecordingTarget::new(json!({"key": "a"}))),
        ))
        .unwrap()
        .step(StepDefinition::new(
            "GenFeed",
            "feed",
            Arc::new(ScriptedTarget::new(vec![Err(StepError::task_failed("no strips"))])),
        ))
        .unwrap()
        .step(StepDefinition::new("SendHeartbeat", "heartbeat", heartbeat.clone()))
        .unwrap()
        .build()
        .unwrap();

    let outcome = Orchestrator::new(definition).run().await;

    assert_failed_at(&outcome, "GenFeed", &FailureKind::TaskFailed);
    let failure = assert_run_failed(&outcome);
    assert_eq!(failure.step_index, 1);
    assert_eq!(failure.completed_steps, vec!["GetStrip".to_string()]);
    assert_eq!(heartbeat.call_count(), 0);
    assert!(outcome.context().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_timeout_fires_while_step_is_retrying() {
    // Attempts fail fast; the second backoff (20 s) outlives the 15 s pipeline budget.
    let failing = Arc::new(ScriptedTarget::new(vec![
        Err(StepError::task_failed("1")),
        Err(StepError::task_failed("2")),
        Err(StepError::task_failed("3")),
    ]));
    let definition = PipelineBuilder::new("feed")
        .with_timeout(Duration::from_secs(15))
        .step(StepDefinition::new(
            "GetStrip",
            "strip",
            Arc::new(RecordingTarget::new(json!({"key": "a"}))),
        ))
        .unwrap()
        .step(
            StepDefinition::new("GenFeed", "feed", failing.clone())
                .with_timeout(Duration::from_secs(30))
                .with_retry(feed_retry().with_max_attempts(3)),
        )
        .unwrap()
        .build()
        .unwrap();

    let started = Instant::now();
    let outcome = Orchestrator::new(definition).run().await;

    assert_failed_at(&outcome, "GenFeed", &FailureKind::Timeout);
    let failure = assert_run_failed(&outcome);
    assert_eq!(failure.scope, FailureScope::Pipeline);
    assert_eq!(failure.attempts, 2);
    assert_eq!(failing.call_count(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_timeout_abandons_in_flight_step() {
    let slow = Arc::new(SlowTarget::new(Duration::from_secs(600), json!("late")));
    let definition = PipelineBuilder::new("feed")
        .with_timeout(Duration::from_secs(60))
        .step(StepDefinition::new("GetStrip", "strip", slow.clone()).with_timeout(Duration::from_secs(300)))
        .unwrap()
        .build()
        .unwrap();

    let outcome = Orchestrator::new(definition).run().await;

    assert_failed_at(&outcome, "GetStrip", &FailureKind::Timeout);
    assert_eq!(assert_run_failed(&outcome).attempts, 1);
    assert_eq!(slow.call_count(), 1);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let target = {
        let counter = counter.clone();
        FnTarget::new("counter", move |_req| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                tokio::task::yield_now().await;
                Ok::<_, StepError>(json!(n))
            }
            .boxed()
        })
    };
    let definition = PipelineBuilder::new("feed")
        .step(StepDefinition::new("Count", "count", Arc::new(target)))
        .unwrap()
        .build()
        .unwrap();
    let pipeline = Arc::new(Orchestrator::new(definition));

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run_with(RunIdentity::manual("feed")).await }
    });
    let second = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run_with(RunIdentity::manual("feed")).await }
    });

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert_ne!(first.identity().run_id, second.identity().run_id);
    let mut counts = vec![
        first.context().unwrap().get("count").cloned().unwrap(),
        second.context().unwrap().get("count").cloned().unwrap(),
    ];
    counts.sort_by_key(|v| v.as_u64());
    assert_eq!(counts, vec![json!(0), json!(1)]);
    assert_eq!(first.context().unwrap().len(), 1);
    assert_eq!(second.context().unwrap().len(), 1);
}

#[test]
fn test_duplicate_result_field_fails_at_construction() {
    let err = PipelineDefinition::new(
        "feed",
        vec![
            StepDefinition::new("GetStrip", "strip", Arc::new(RecordingTarget::new(json!(1)))),
            StepDefinition::new("GenFeed", "strip", Arc::new(RecordingTarget::new(json!(2)))),
        ],
        Duration::from_secs(60),
    )
    .unwrap_err();

    assert_eq!(err.kind(), FailureKind::ConfigurationError);
    assert_eq!(err.code(), Some("CONFIG-DUP_FIELD"));
}

#[tokio::test(start_paused = true)]
async fn test_event_sequence_for_retried_run() {
    let events = Arc::new(CollectingEventSink::new());
    let definition = PipelineBuilder::new("feed")
        .step(
            StepDefinition::new(
                "GetStrip",
                "strip",
                Arc::new(ScriptedTarget::failing_then(1, &StepError::task_failed("flaky"), json!(1))),
            )
            .with_retry(feed_retry()),
        )
        .unwrap()
        .build()
        .unwrap();

    let outcome = Orchestrator::new(definition)
        .with_event_sink(events.clone())
        .run()
        .await;

    assert_run_succeeded(&outcome);
    assert_eq!(
        events.kinds(),
        vec![
            "run.started",
            "step.started",
            "step.retrying",
            "step.completed",
            "run.succeeded"
        ]
    );
    assert!(events
        .events()
        .iter()
        .all(|e| e.run_id == outcome.identity().run_id));
}

#[tokio::test]
async fn test_event_sequence_for_failed_run() {
    let events = Arc::new(CollectingEventSink::new());
    let definition = PipelineBuilder::new("feed")
        .step(StepDefinition::new(
            "GetStrip",
            "strip",
            Arc::new(ScriptedTarget::new(vec![Err(StepError::task_failed("boom"))])),
        ))
        .unwrap()
        .build()
        .unwrap();

    let outcome = Orchestrator::new(definition)
        .with_event_sink(events.clone())
        .run()
        .await;

    assert_run_failed(&outcome);
    assert_eq!(
        events.kinds(),
        vec!["run.started", "step.started", "step.failed", "run.failed"]
    );
}
