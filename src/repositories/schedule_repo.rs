use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{Job, JobSchedule};
use crate::schema::{job_schedules, jobs};

#[derive(Clone)]
pub struct JobScheduleRepository {
    pool: AsyncDbPool,
}

impl JobScheduleRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_job(&self, job_id: i32) -> AppResult<JobSchedule> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        job_schedules::table
            .filter(job_schedules::job_id.eq(job_id))
            .first(&mut conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => AppError::NotFound {
                    entity: "JobSchedule".to_string(),
                    field: "job_id".to_string(),
                    value: job_id.to_string(),
                },
                _ => AppError::from(e),
            })
    }

    /// Harvest query for the dispatcher: due schedule rows joined against
    /// active jobs, smallest `next_execution_time` first, bounded by
    /// `limit`. Rows of soft-deleted jobs are filtered out here.
    pub async fn due_with_jobs(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<(JobSchedule, Job)>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        job_schedules::table
            .inner_join(jobs::table)
            .filter(job_schedules::next_execution_time.le(now))
            .filter(jobs::is_active.eq(true))
            .order(job_schedules::next_execution_time.asc())
            .limit(limit)
            .select((JobSchedule::as_select(), Job::as_select()))
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    pub async fn update_next_time(
        &self,
        job_id: i32,
        next_execution_time: NaiveDateTime,
    ) -> AppResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let updated = diesel::update(
            job_schedules::table.filter(job_schedules::job_id.eq(job_id)),
        )
        .set(job_schedules::next_execution_time.eq(next_execution_time))
        .execute(&mut conn)
        .await
        .map_err(AppError::from)?;

        if updated == 0 {
            return Err(AppError::NotFound {
                entity: "JobSchedule".to_string(),
                field: "job_id".to_string(),
                value: job_id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn delete_by_job(&self, job_id: i32) -> AppResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        let deleted =
            diesel::delete(job_schedules::table.filter(job_schedules::job_id.eq(job_id)))
                .execute(&mut conn)
                .await
                .map_err(AppError::from)?;

        if deleted == 0 {
            return Err(AppError::NotFound {
                entity: "JobSchedule".to_string(),
                field: "job_id".to_string(),
                value: job_id.to_string(),
            });
        }
        Ok(())
    }
}
