//! Job service for business logic operations.

use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::models::{Job, JobExecution, JobSchedule, JobType, NewJob};
use crate::repositories::Repositories;
use crate::schedule::ScheduleEngine;

/// Validated input for job creation, produced by the API layer.
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub schedule: String,
    pub target_url: String,
    pub job_type: JobType,
    pub is_recurring: bool,
    pub description: Option<String>,
    pub max_retry_count: i32,
}

/// Job service for handling job-related business logic.
#[derive(Clone)]
pub struct JobService {
    repos: Repositories,
    engine: ScheduleEngine,
}

impl JobService {
    pub fn new(repos: Repositories) -> Self {
        Self {
            repos,
            engine: ScheduleEngine::new(),
        }
    }

    /// Creates a job and its initial schedule row atomically.
    ///
    /// The schedule expression is validated and the first fire time computed
    /// before anything is written; a job never exists without a pending
    /// firing.
    pub async fn create_job(&self, input: CreateJob) -> AppResult<Job> {
        if input.max_retry_count < 0 {
            return Err(AppError::Validation {
                field: "maxRetryCount".to_string(),
                reason: "must be zero or positive".to_string(),
            });
        }

        let next_execution_time = self
            .engine
            .next_after(&input.schedule, Utc::now())?
            .naive_utc();

        let new_job = NewJob {
            schedule: input.schedule,
            target_url: input.target_url,
            job_type: input.job_type,
            is_recurring: input.is_recurring,
            is_active: true,
            description: input.description,
            max_retry_count: input.max_retry_count,
        };

        let job = self
            .repos
            .jobs
            .create_with_schedule(new_job, next_execution_time)
            .await?;

        tracing::info!(
            job_id = job.id,
            schedule = %job.schedule,
            job_type = %job.job_type,
            is_recurring = job.is_recurring,
            next_execution_time = %next_execution_time,
            "Job created"
        );
        Ok(job)
    }

    pub async fn get_job(&self, id: i32) -> AppResult<Job> {
        self.repos.jobs.get_active(id).await
    }

    /// Active jobs with the total active count for pagination envelopes.
    pub async fn list_jobs(&self, limit: i64, offset: i64) -> AppResult<(Vec<Job>, i64)> {
        let jobs = self.repos.jobs.list_active(limit, offset).await?;
        let total = self.repos.jobs.count_active().await?;
        Ok((jobs, total))
    }

    /// Soft-deletes a job and drops its pending schedule row.
    pub async fn delete_job(&self, id: i32) -> AppResult<()> {
        self.repos.jobs.soft_delete(id).await?;
        tracing::info!(job_id = id, "Job soft-deleted");
        Ok(())
    }

    pub async fn get_schedule(&self, job_id: i32) -> AppResult<JobSchedule> {
        self.repos.schedules.get_by_job(job_id).await
    }

    pub async fn get_history(&self, job_id: i32, limit: i64) -> AppResult<Vec<JobExecution>> {
        self.repos.executions.list_by_job(job_id, limit).await
    }
}
