use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Job, JobType};

/// Default per-call HTTP deadline for a queued attempt, in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 90;

/// Upper bound on the exponential retry delay, in seconds.
const MAX_RETRY_DELAY_SECONDS: u64 = 300;

/// A transient unit of work carrying one (possibly retried) attempt of one
/// firing. Lives only inside the broker.
///
/// `queue_id` is unique per enqueue (job id plus a nanosecond tag) so that
/// retries of the same firing are distinct members in every lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub queue_id: String,
    pub job_id: i32,
    pub target_url: String,
    pub max_retry_count: i32,
    pub retry_count: i32,
    pub job_type: JobType,
    pub is_recurring: bool,
    pub schedule: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub timeout_seconds: u64,
}

impl QueueMessage {
    /// Builds the first-attempt message for a due schedule row.
    pub fn new(job: &Job, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            queue_id: Self::generate_queue_id(job.id),
            job_id: job.id,
            target_url: job.target_url.clone(),
            max_retry_count: job.max_retry_count,
            retry_count: 0,
            job_type: job.job_type,
            is_recurring: job.is_recurring,
            schedule: job.schedule.clone(),
            created_at: Utc::now(),
            scheduled_at,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }

    /// Builds the follow-up message for a retryable failure: fresh
    /// `queue_id`, incremented `retry_count`, everything else carried over.
    pub fn retry(&self) -> Self {
        Self {
            queue_id: Self::generate_queue_id(self.job_id),
            retry_count: self.retry_count + 1,
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    fn generate_queue_id(job_id: i32) -> String {
        let nanos = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp_micros());
        format!("job_{}_{}", job_id, nanos)
    }

    /// Whether a failed attempt of this message earns another in-lane try.
    ///
    /// AT_MOST_ONCE is never retried; AT_LEAST_ONCE retries until
    /// `retry_count` reaches `max_retry_count`.
    pub fn should_retry(&self) -> bool {
        if self.retry_count >= self.max_retry_count {
            return false;
        }
        match self.job_type {
            JobType::AtMostOnce => false,
            JobType::AtLeastOnce => true,
        }
    }

    /// Exponential backoff before the next retry: `2^retry_count` seconds
    /// capped at five minutes (1s, 2s, 4s, ... 300s).
    pub fn retry_delay(&self) -> std::time::Duration {
        let exp = self.retry_count.clamp(0, 62) as u32;
        let seconds = 1u64
            .checked_shl(exp)
            .unwrap_or(MAX_RETRY_DELAY_SECONDS)
            .min(MAX_RETRY_DELAY_SECONDS);
        std::time::Duration::from_secs(seconds)
    }

    pub fn serialize(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn deserialize(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

/// Terminal state of a queue message as recorded in the completed lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueResultStatus {
    Completed,
    Failed,
}

/// The record appended to the completed lane when a message reaches a
/// terminal state (success, or failure with retries exhausted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResult {
    pub queue_id: String,
    pub job_id: i32,
    pub status: QueueResultStatus,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_duration_ns: Option<i64>,
    pub retry_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_job(job_type: JobType, max_retry_count: i32) -> Job {
        let created = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Job {
            id: 7,
            schedule: "*/10 * * * * *".to_string(),
            target_url: "http://localhost:9090/hook".to_string(),
            job_type,
            is_recurring: true,
            is_active: true,
            description: None,
            max_retry_count,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn new_message_starts_at_retry_zero() {
        let job = sample_job(JobType::AtLeastOnce, 3);
        let msg = QueueMessage::new(&job, Utc::now());

        assert_eq!(msg.retry_count, 0);
        assert_eq!(msg.job_id, 7);
        assert_eq!(msg.timeout_seconds, 90);
        assert!(msg.queue_id.starts_with("job_7_"));
    }

    #[test]
    fn retry_gets_fresh_queue_id_and_incremented_count() {
        let job = sample_job(JobType::AtLeastOnce, 3);
        let msg = QueueMessage::new(&job, Utc::now());
        let retried = msg.retry();

        assert_eq!(retried.retry_count, 1);
        assert_ne!(retried.queue_id, msg.queue_id);
        assert_eq!(retried.job_id, msg.job_id);
        assert_eq!(retried.schedule, msg.schedule);
    }

    #[test]
    fn at_most_once_never_retries() {
        let job = sample_job(JobType::AtMostOnce, 5);
        let msg = QueueMessage::new(&job, Utc::now());
        assert!(!msg.should_retry());
    }

    #[test]
    fn at_least_once_retries_until_cap() {
        let job = sample_job(JobType::AtLeastOnce, 2);
        let msg = QueueMessage::new(&job, Utc::now());
        assert!(msg.should_retry());

        let first_retry = msg.retry();
        assert!(first_retry.should_retry());

        let second_retry = first_retry.retry();
        assert_eq!(second_retry.retry_count, 2);
        assert!(!second_retry.should_retry());
    }

    #[test]
    fn retry_delay_doubles_and_caps_at_five_minutes() {
        let job = sample_job(JobType::AtLeastOnce, 20);
        let mut msg = QueueMessage::new(&job, Utc::now());

        let expected = [1u64, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300];
        for want in expected {
            assert_eq!(msg.retry_delay().as_secs(), want);
            msg = msg.retry();
        }
    }

    #[test]
    fn message_round_trips_through_json() {
        let job = sample_job(JobType::AtLeastOnce, 3);
        let msg = QueueMessage::new(&job, Utc::now());

        let data = msg.serialize().unwrap();
        let back = QueueMessage::deserialize(&data).unwrap();
        assert_eq!(back, msg);
    }
}
