//! Postgres-backed metadata store, delegating to the diesel repositories.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{ExecutionStatus, Job, JobExecution, JobSchedule, NewJobExecution};
use crate::repositories::Repositories;
use crate::storage::MetadataStore;

#[derive(Clone)]
pub struct PgMetadataStore {
    repos: Repositories,
}

impl PgMetadataStore {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            repos: Repositories::new(pool),
        }
    }
}

/// Repositories answer "not found" with an error carrying API context; the
/// scheduling core wants an `Option` instead (the completion protocol treats
/// absence as "already finalized").
fn optional<T>(result: AppResult<T>) -> AppResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::NotFound { .. }) => Ok(None),
        Err(other) => Err(other),
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn due_schedules(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<(JobSchedule, Job)>> {
        self.repos.schedules.due_with_jobs(now, limit).await
    }

    async fn in_flight_execution(&self, job_id: i32) -> AppResult<Option<JobExecution>> {
        self.repos.executions.in_flight(job_id).await
    }

    async fn create_execution(&self, exec: NewJobExecution) -> AppResult<JobExecution> {
        self.repos.executions.create(exec).await
    }

    async fn mark_execution_running(&self, id: i64) -> AppResult<()> {
        self.repos.executions.mark_running(id).await
    }

    async fn finalize_execution(
        &self,
        id: i64,
        status: ExecutionStatus,
        error: Option<String>,
        duration_ns: i64,
    ) -> AppResult<()> {
        self.repos
            .executions
            .finalize(id, status, error, duration_ns)
            .await
    }

    async fn get_job(&self, id: i32) -> AppResult<Option<Job>> {
        optional(self.repos.jobs.get_active(id).await)
    }

    async fn get_schedule(&self, job_id: i32) -> AppResult<Option<JobSchedule>> {
        optional(self.repos.schedules.get_by_job(job_id).await)
    }

    async fn update_schedule(
        &self,
        job_id: i32,
        next_execution_time: NaiveDateTime,
    ) -> AppResult<()> {
        self.repos
            .schedules
            .update_next_time(job_id, next_execution_time)
            .await
    }

    async fn delete_schedule(&self, job_id: i32) -> AppResult<()> {
        // Deleting an already-deleted row is the idempotent-completion path.
        match self.repos.schedules.delete_by_job(job_id).await {
            Err(AppError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }
}
