use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{ExecutionStatus, JobExecution, NewJobExecution};
use crate::schema::job_executions;

#[derive(Clone)]
pub struct JobExecutionRepository {
    pool: AsyncDbPool,
}

impl JobExecutionRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, exec: NewJobExecution) -> AppResult<JobExecution> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::insert_into(job_executions::table)
            .values(&exec)
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    pub async fn mark_running(&self, id: i64) -> AppResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::update(job_executions::table.find(id))
            .set((
                job_executions::status.eq(ExecutionStatus::Running),
                job_executions::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .map_err(AppError::from)?;

        Ok(())
    }

    /// Writes the terminal status, error text, and measured duration.
    /// Terminal rows are never touched again.
    pub async fn finalize(
        &self,
        id: i64,
        status: ExecutionStatus,
        error: Option<String>,
        duration_ns: i64,
    ) -> AppResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        diesel::update(job_executions::table.find(id))
            .set((
                job_executions::status.eq(status),
                job_executions::error.eq(error),
                job_executions::execution_duration_ns.eq(duration_ns),
                job_executions::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .map_err(AppError::from)?;

        Ok(())
    }

    /// The single-flight probe: any SCHEDULED or RUNNING execution for this
    /// job.
    pub async fn in_flight(&self, job_id: i32) -> AppResult<Option<JobExecution>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        job_executions::table
            .filter(job_executions::job_id.eq(job_id))
            .filter(
                job_executions::status
                    .eq_any([ExecutionStatus::Scheduled, ExecutionStatus::Running]),
            )
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    pub async fn list_by_job(&self, job_id: i32, limit: i64) -> AppResult<Vec<JobExecution>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        job_executions::table
            .filter(job_executions::job_id.eq(job_id))
            .order(job_executions::created_at.desc())
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }
}
