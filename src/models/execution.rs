use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::schema::job_executions;

/// Lifecycle of one attempted firing.
///
/// Transitions are strictly forward: SCHEDULED -> RUNNING -> SUCCESS | FAILED.
/// Terminal rows are never mutated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, ToSchema,
)]
#[db_enum(
    existing_type_path = "crate::schema::sql_types::ExecutionStatus",
    value_style = "SCREAMING_SNAKE_CASE"
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Scheduled,
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    /// SCHEDULED and RUNNING rows are in flight; the single-flight guard
    /// allows at most one such row per job at any time.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ExecutionStatus::Scheduled | ExecutionStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Scheduled => write!(f, "SCHEDULED"),
            ExecutionStatus::Running => write!(f, "RUNNING"),
            ExecutionStatus::Success => write!(f, "SUCCESS"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// An append-only record of one attempted firing.
///
/// `retry_count` is 0 for the first attempt of a firing, 1 for the first
/// retry, and so on. Durations are stored in nanoseconds; the API reports
/// milliseconds.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = job_executions)]
pub struct JobExecution {
    pub id: i64,
    pub job_id: i32,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub execution_time: NaiveDateTime,
    pub execution_duration_ns: Option<i64>,
    pub retry_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_executions)]
pub struct NewJobExecution {
    pub job_id: i32,
    pub status: ExecutionStatus,
    pub execution_time: NaiveDateTime,
    pub retry_count: i32,
}
