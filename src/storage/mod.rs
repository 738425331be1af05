//! Metadata store abstraction.
//!
//! The dispatcher, worker runtime, and completion handler depend on this
//! capability trait rather than on concrete repositories, so an in-memory
//! double can stand in for Postgres in tests.

mod memory;
mod postgres;

pub use memory::MemoryMetadataStore;
pub use postgres::PgMetadataStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::AppResult;
use crate::models::{ExecutionStatus, Job, JobExecution, JobSchedule, NewJobExecution};

/// The exact operation set the scheduling core needs from the metadata
/// store. Admin API reads go through the repositories directly; this trait
/// stays minimal on purpose.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Due schedule rows joined against active jobs, ordered by
    /// `next_execution_time` ascending, bounded by `limit`.
    async fn due_schedules(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<(JobSchedule, Job)>>;

    /// Any SCHEDULED or RUNNING execution for the job.
    async fn in_flight_execution(&self, job_id: i32) -> AppResult<Option<JobExecution>>;

    async fn create_execution(&self, exec: NewJobExecution) -> AppResult<JobExecution>;

    async fn mark_execution_running(&self, id: i64) -> AppResult<()>;

    async fn finalize_execution(
        &self,
        id: i64,
        status: ExecutionStatus,
        error: Option<String>,
        duration_ns: i64,
    ) -> AppResult<()>;

    /// Active job by id; `None` for missing or soft-deleted jobs.
    async fn get_job(&self, id: i32) -> AppResult<Option<Job>>;

    /// Pending schedule row for a job; `None` when already finalized.
    async fn get_schedule(&self, job_id: i32) -> AppResult<Option<JobSchedule>>;

    async fn update_schedule(
        &self,
        job_id: i32,
        next_execution_time: NaiveDateTime,
    ) -> AppResult<()>;

    async fn delete_schedule(&self, job_id: i32) -> AppResult<()>;
}
