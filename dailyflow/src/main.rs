//! Dailyflow CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dailyflow::config::PipelineConfig;
use dailyflow::errors::{ContractSuggestions, PipelineValidationError};
use dailyflow::events::LoggingEventSink;
use dailyflow::observability::{init_tracing, LogFormat};
use dailyflow::pipeline::{Orchestrator, RunOutcome};
use dailyflow::scheduler::Scheduler;
use dailyflow::store::{purge_expired, FsArtifactStore, RetentionRule};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Dailyflow - scheduled step pipeline runner.
#[derive(Debug, Parser)]
#[command(name = "dailyflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the pipeline config file
    #[arg(short, long, global = true, env = "DAILYFLOW_CONFIG", default_value = "dailyflow.json")]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the pipeline once and print the outcome as JSON
    RunOnce,

    /// Fire the pipeline on its schedule until Ctrl-C
    Serve,

    /// Load and validate the config, then print the step plan
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.log_format) {
        eprintln!("{e}");
    }

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = PipelineConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::RunOnce => run_once(config).await,
        Commands::Serve => serve(config).await.map(|()| ExitCode::SUCCESS),
        Commands::Validate => validate(config).map(|()| ExitCode::SUCCESS),
    }
}

/// Attaches the fix hint for the error's code, if one is known.
fn explain(err: PipelineValidationError) -> anyhow::Error {
    let hint = err.error_info.as_ref().and_then(|info| {
        info.fix_hint
            .clone()
            .or_else(|| ContractSuggestions::get(&info.code).map(str::to_string))
    });
    match hint {
        Some(hint) => anyhow!("invalid pipeline configuration: {err}\n  hint: {hint}"),
        None => anyhow!("invalid pipeline configuration: {err}"),
    }
}

fn orchestrator(config: PipelineConfig) -> Result<Orchestrator> {
    let definition = config.into_definition().map_err(explain)?;
    Ok(Orchestrator::new(definition).with_event_sink(Arc::new(LoggingEventSink::default())))
}

async fn run_once(config: PipelineConfig) -> Result<ExitCode> {
    let outcome = orchestrator(config)?.run().await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn serve(config: PipelineConfig) -> Result<()> {
    let trigger = config.trigger().map_err(explain)?;
    let retention = match (&config.store_dir, &config.retention) {
        (Some(dir), Some(rule)) => Some((FsArtifactStore::new(dir), rule.clone())),
        _ => None,
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(Arc::new(orchestrator(config)?), trigger).with_outcomes(tx);
    let reporter = tokio::spawn(report_outcomes(rx, retention));

    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await;

    drop(scheduler);
    reporter.abort();
    Ok(())
}

/// Logs each run's outcome and applies retention once per completed tick.
async fn report_outcomes(
    mut outcomes: mpsc::UnboundedReceiver<RunOutcome>,
    retention: Option<(FsArtifactStore, RetentionRule)>,
) {
    while let Some(outcome) = outcomes.recv().await {
        match serde_json::to_string(&outcome) {
            Ok(json) => info!(run_id = %outcome.identity().run_id, outcome = %json, "Run finished"),
            Err(e) => warn!(error = %e, "Failed to serialize outcome"),
        }

        if let Some((store, rule)) = &retention {
            if let Err(e) = purge_expired(store, rule, chrono::Utc::now()).await {
                warn!(error = %e, prefix = %rule.prefix, "Retention purge failed");
            }
        }
    }
}

fn validate(config: PipelineConfig) -> Result<()> {
    let trigger = config.trigger().map_err(explain)?;
    let definition = config.into_definition().map_err(explain)?;

    println!(
        "Pipeline '{}': {} step(s), timeout {:?}, {trigger}",
        definition.name(),
        definition.step_count(),
        definition.timeout()
    );
    for (index, step) in definition.steps().iter().enumerate() {
        let retry = step.retry.as_ref().map_or_else(
            || "no retry".to_string(),
            |p| format!("{} attempts, {:?} x{}", p.max_attempts, p.interval, p.backoff_rate),
        );
        println!(
            "  {}. {} -> {} (timeout {:?}, {retry})",
            index + 1,
            step.name,
            step.result_field,
            step.timeout
        );
    }
    Ok(())
}
