//! Job-related DTOs for API requests and responses.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppResult;
use crate::models::{ExecutionStatus, Job, JobExecution, JobSchedule};
use crate::services::job_service::CreateJob;

fn format_timestamp(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Request body for creating a job.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "schedule": "*/10 * * * * *",
    "api": "https://example.com/hooks/refresh",
    "type": "AT_LEAST_ONCE",
    "isRecurring": true,
    "description": "Refresh the cache every ten seconds",
    "maxRetryCount": 3
}))]
pub struct CreateJobRequest {
    /// 6-field CRON expression with seconds as the leading field
    #[validate(length(min = 1, max = 100, message = "Schedule must be between 1 and 100 characters"))]
    #[schema(example = "*/10 * * * * *")]
    pub schedule: String,

    /// Webhook URL the job POSTs to
    #[validate(url(message = "Target URL must be a valid URL"))]
    #[schema(example = "https://example.com/hooks/refresh")]
    pub api: String,

    /// Delivery semantics: AT_LEAST_ONCE or AT_MOST_ONCE
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Job type is required"))]
    #[schema(example = "AT_LEAST_ONCE")]
    pub job_type: String,

    #[serde(default)]
    #[schema(example = true)]
    pub is_recurring: bool,

    pub description: Option<String>,

    /// Retry budget per firing; 0 or omitted defaults to 3
    #[serde(default)]
    #[validate(range(min = 0, message = "maxRetryCount must be zero or positive"))]
    #[schema(example = 3)]
    pub max_retry_count: i32,
}

impl CreateJobRequest {
    pub fn into_create_job(self) -> AppResult<CreateJob> {
        let job_type = self.job_type.parse()?;

        let max_retry_count = if self.max_retry_count == 0 {
            3
        } else {
            self.max_retry_count
        };

        Ok(CreateJob {
            schedule: self.schedule,
            target_url: self.api,
            job_type,
            is_recurring: self.is_recurring,
            description: self.description,
            max_retry_count,
        })
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Response body for job creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateJobResponse {
    pub id: i32,
    pub message: String,
}

/// Response body for job data.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: i32,
    pub schedule: String,
    pub api: String,
    #[serde(rename = "type")]
    pub job_type: crate::models::JobType,
    pub is_recurring: bool,
    pub is_active: bool,
    pub description: Option<String>,
    pub max_retry_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            schedule: job.schedule,
            api: job.target_url,
            job_type: job.job_type,
            is_recurring: job.is_recurring,
            is_active: job.is_active,
            description: job.description,
            max_retry_count: job.max_retry_count,
            created_at: format_timestamp(job.created_at),
            updated_at: format_timestamp(job.updated_at),
        }
    }
}

/// Paginated job list envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response body for a job's pending schedule row.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub id: i32,
    pub job_id: i32,
    pub next_execution_time: String,
    pub created_at: String,
}

impl From<JobSchedule> for ScheduleResponse {
    fn from(schedule: JobSchedule) -> Self {
        Self {
            id: schedule.id,
            job_id: schedule.job_id,
            next_execution_time: format_timestamp(schedule.next_execution_time),
            created_at: format_timestamp(schedule.created_at),
        }
    }
}

/// Response body for one execution attempt.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub id: i64,
    pub job_id: i32,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time: String,
    /// Duration in milliseconds; stored internally in nanoseconds
    pub execution_duration_ms: Option<i64>,
    pub retry_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<JobExecution> for ExecutionResponse {
    fn from(exec: JobExecution) -> Self {
        Self {
            id: exec.id,
            job_id: exec.job_id,
            status: exec.status,
            error: exec.error,
            execution_time: format_timestamp(exec.execution_time),
            execution_duration_ms: exec.execution_duration_ns.map(|ns| ns / 1_000_000),
            retry_count: exec.retry_count,
            created_at: format_timestamp(exec.created_at),
            updated_at: format_timestamp(exec.updated_at),
        }
    }
}

/// Execution history envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub executions: Vec<ExecutionResponse>,
    pub total: usize,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::JobType;
    use chrono::NaiveDate;

    fn request(job_type: &str, max_retry_count: i32) -> CreateJobRequest {
        CreateJobRequest {
            schedule: "*/10 * * * * *".to_string(),
            api: "https://example.com/hook".to_string(),
            job_type: job_type.to_string(),
            is_recurring: true,
            description: None,
            max_retry_count,
        }
    }

    #[test]
    fn test_into_create_job_parses_type() {
        let create = request("AT_LEAST_ONCE", 2).into_create_job().unwrap();
        assert_eq!(create.job_type, JobType::AtLeastOnce);
        assert_eq!(create.max_retry_count, 2);
        assert_eq!(create.target_url, "https://example.com/hook");
    }

    #[test]
    fn test_into_create_job_defaults_retry_count() {
        let create = request("AT_MOST_ONCE", 0).into_create_job().unwrap();
        assert_eq!(create.max_retry_count, 3);
    }

    #[test]
    fn test_into_create_job_rejects_bad_type() {
        let error = request("EXACTLY_ONCE", 3).into_create_job().unwrap_err();
        assert!(matches!(error, AppError::InvalidJobType { .. }));
    }

    #[test]
    fn test_request_validation_rejects_bad_url() {
        let mut req = request("AT_LEAST_ONCE", 3);
        req.api = "not-a-url".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_deserializes_wire_names() {
        let req: CreateJobRequest = serde_json::from_str(
            r#"{
                "schedule": "0 0 12 * * *",
                "api": "https://example.com/h",
                "type": "AT_MOST_ONCE",
                "isRecurring": false,
                "maxRetryCount": 5
            }"#,
        )
        .unwrap();
        assert_eq!(req.job_type, "AT_MOST_ONCE");
        assert!(!req.is_recurring);
        assert_eq!(req.max_retry_count, 5);
    }

    #[test]
    fn test_job_response_wire_shape() {
        let dt = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let job = Job {
            id: 9,
            schedule: "*/10 * * * * *".to_string(),
            target_url: "https://example.com/hook".to_string(),
            job_type: JobType::AtLeastOnce,
            is_recurring: true,
            is_active: true,
            description: Some("test".to_string()),
            max_retry_count: 3,
            created_at: dt,
            updated_at: dt,
        };

        let json = serde_json::to_value(JobResponse::from(job)).unwrap();
        assert_eq!(json["api"], "https://example.com/hook");
        assert_eq!(json["type"], "AT_LEAST_ONCE");
        assert_eq!(json["isRecurring"], true);
        assert_eq!(json["maxRetryCount"], 3);
        assert_eq!(json["createdAt"], "2025-06-01T12:00:00.000Z");
    }

    #[test]
    fn test_execution_response_reports_milliseconds() {
        let dt = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let exec = JobExecution {
            id: 1,
            job_id: 9,
            status: ExecutionStatus::Success,
            error: None,
            execution_time: dt,
            execution_duration_ns: Some(1_500_000_000),
            retry_count: 0,
            created_at: dt,
            updated_at: dt,
        };

        let response = ExecutionResponse::from(exec);
        assert_eq!(response.execution_duration_ms, Some(1500));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert!(json.get("error").is_none());
    }
}
