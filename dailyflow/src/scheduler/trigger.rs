//! Recurring calendar triggers.

use crate::errors::{ContractErrorInfo, PipelineValidationError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// When a scheduled pipeline fires. All times are UTC.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Once a day at a fixed hour and minute.
    Daily {
        /// Hour of day, 0-23.
        hour: u32,
        /// Minute of hour, 0-59.
        minute: u32,
    },
    /// A cron expression with a leading seconds field.
    Cron {
        /// The expression as configured.
        expression: String,
        /// The parsed schedule.
        schedule: Box<cron::Schedule>,
    },
}

impl Default for Trigger {
    fn default() -> Self {
        Self::Daily { hour: 8, minute: 0 }
    }
}

impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Daily { hour: h1, minute: m1 }, Self::Daily { hour: h2, minute: m2 }) => {
                h1 == h2 && m1 == m2
            }
            (Self::Cron { expression: a, .. }, Self::Cron { expression: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Trigger {
    /// Creates a daily trigger.
    ///
    /// # Errors
    ///
    /// Returns an error if the hour or minute is out of range.
    pub fn daily(hour: u32, minute: u32) -> Result<Self, PipelineValidationError> {
        if hour > 23 || minute > 59 {
            return Err(trigger_error(format!(
                "Daily trigger {hour:02}:{minute:02} is not a valid time of day"
            )));
        }
        Ok(Self::Daily { hour, minute })
    }

    /// Parses a cron trigger, e.g. `0 0 8 * * *`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is empty or does not parse.
    pub fn cron(expression: &str) -> Result<Self, PipelineValidationError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(trigger_error("Cron expression cannot be empty".to_string()));
        }

        let schedule = cron::Schedule::from_str(expression).map_err(|e| {
            trigger_error(format!("Invalid cron expression '{expression}': {e}"))
        })?;

        Ok(Self::Cron {
            expression: expression.to_string(),
            schedule: Box::new(schedule),
        })
    }

    /// Returns the first fire time strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Daily { hour, minute } => {
                let today = after.date_naive().and_hms_opt(*hour, *minute, 0)?;
                let candidate = Utc.from_utc_datetime(&today);
                if candidate > after {
                    Some(candidate)
                } else {
                    candidate.checked_add_signed(Duration::days(1))
                }
            }
            Self::Cron { schedule, .. } => schedule.after(&after).next(),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily { hour, minute } => write!(f, "daily at {hour:02}:{minute:02} UTC"),
            Self::Cron { expression, .. } => write!(f, "cron '{expression}' UTC"),
        }
    }
}

fn trigger_error(message: String) -> PipelineValidationError {
    let summary = message.clone();
    PipelineValidationError::new(message)
        .with_error_info(ContractErrorInfo::new("CONFIG-TRIGGER", summary))
}
