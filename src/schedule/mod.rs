//! Schedule engine: second-precision CRON recurrence evaluation.
//!
//! Expressions use the 6-field extended CRON form
//! (`second minute hour day-of-month month day-of-week`) with `*`, steps,
//! ranges, lists, and named month/weekday tokens. All computation is pure,
//! deterministic, and UTC-only.

use chrono::{DateTime, Duration, Utc};
use croner::Cron;
use thiserror::Error;

/// Forward search horizon: an expression that admits no firing within the
/// next 8 years is treated as having none at all.
const SEARCH_HORIZON_DAYS: i64 = 8 * 366;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression: {0}")]
    Parse(String),

    #[error("schedule has no occurrence within the next 8 years")]
    NoUpcomingOccurrence,
}

/// Stateless evaluator for stored schedule expressions.
///
/// Schedules are re-parsed from the stored string on every use; parsing is
/// cheap relative to the surrounding I/O and keeps the engine free of cache
/// invalidation concerns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleEngine;

impl ScheduleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Structural validation of an expression. Called at job creation and
    /// before every `next_after`.
    pub fn parse(&self, expr: &str) -> Result<Cron, ScheduleError> {
        Cron::new(expr)
            .with_seconds_required()
            .parse()
            .map_err(|e| ScheduleError::Parse(e.to_string()))
    }

    /// Computes the next instant strictly greater than `from` at which the
    /// expression fires.
    pub fn next_after(
        &self,
        expr: &str,
        from: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let cron = self.parse(expr)?;
        let next = cron
            .find_next_occurrence(&from, false)
            .map_err(|_| ScheduleError::NoUpcomingOccurrence)?;

        if next - from > Duration::days(SEARCH_HORIZON_DAYS) {
            return Err(ScheduleError::NoUpcomingOccurrence);
        }
        Ok(next)
    }

    /// Convenience check for the admin API.
    pub fn validate(&self, expr: &str) -> bool {
        self.parse(expr).is_ok()
    }
}
