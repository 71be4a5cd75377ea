//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary (or an embedding application) through [`init_tracing`].

use crate::errors::DailyflowError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,dailyflow=debug";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Text,
    /// One JSON object per event, including span fields.
    Json,
}

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), DailyflowError> {
    let registry = tracing_subscriber::registry();
    let result = match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_filter(env_filter()),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_filter(env_filter()),
            )
            .try_init(),
    };
    result.map_err(|e| DailyflowError::Config(format!("Failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_log_format_parses_from_cli_value() {
        assert_eq!(LogFormat::from_str("json", true).unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
