use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::schema::jobs;

/// Delivery semantics of a job.
///
/// AT_LEAST_ONCE jobs are retried with exponential backoff up to
/// `max_retry_count`; AT_MOST_ONCE jobs get a single attempt per firing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, ToSchema,
)]
#[db_enum(
    existing_type_path = "crate::schema::sql_types::JobType",
    value_style = "SCREAMING_SNAKE_CASE"
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    AtLeastOnce,
    AtMostOnce,
}

impl FromStr for JobType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AT_LEAST_ONCE" => Ok(JobType::AtLeastOnce),
            "AT_MOST_ONCE" => Ok(JobType::AtMostOnce),
            other => Err(AppError::InvalidJobType {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::AtLeastOnce => write!(f, "AT_LEAST_ONCE"),
            JobType::AtMostOnce => write!(f, "AT_MOST_ONCE"),
        }
    }
}

/// A user-declared webhook job.
///
/// `is_active = false` is the soft-delete flag; inactive jobs are excluded
/// from all dispatch and API reads. All timestamps are UTC.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: i32,
    pub schedule: String,
    pub target_url: String,
    pub job_type: JobType,
    pub is_recurring: bool,
    pub is_active: bool,
    pub description: Option<String>,
    pub max_retry_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub schedule: String,
    pub target_url: String,
    pub job_type: JobType,
    pub is_recurring: bool,
    pub is_active: bool,
    pub description: Option<String>,
    pub max_retry_count: i32,
}
