use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{Job, NewJob, NewJobSchedule};
use crate::schema::{job_schedules, jobs};

#[derive(Clone)]
pub struct JobRepository {
    pool: AsyncDbPool,
}

impl JobRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Inserts a job together with its initial schedule row in one
    /// transaction. Job creation is the only multi-row write in the system;
    /// a job must never exist without its pending firing.
    pub async fn create_with_schedule(
        &self,
        job: NewJob,
        next_execution_time: NaiveDateTime,
    ) -> AppResult<Job> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        conn.transaction::<Job, AppError, _>(|conn| {
            async move {
                let created: Job = diesel::insert_into(jobs::table)
                    .values(&job)
                    .get_result(conn)
                    .await?;

                diesel::insert_into(job_schedules::table)
                    .values(&NewJobSchedule {
                        job_id: created.id,
                        next_execution_time,
                    })
                    .execute(conn)
                    .await?;

                Ok(created)
            }
            .scope_boxed()
        })
        .await
    }

    /// Fetches an active job; soft-deleted jobs read as missing.
    pub async fn get_active(&self, id: i32) -> AppResult<Job> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        jobs::table
            .find(id)
            .filter(jobs::is_active.eq(true))
            .first(&mut conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => AppError::NotFound {
                    entity: "Job".to_string(),
                    field: "id".to_string(),
                    value: id.to_string(),
                },
                _ => AppError::from(e),
            })
    }

    pub async fn list_active(&self, limit: i64, offset: i64) -> AppResult<Vec<Job>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        jobs::table
            .filter(jobs::is_active.eq(true))
            .order(jobs::id.asc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    pub async fn count_active(&self) -> AppResult<i64> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        jobs::table
            .filter(jobs::is_active.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    /// Soft-deletes a job and removes its pending schedule row, excluding it
    /// from all further dispatch. The execution history is retained.
    pub async fn soft_delete(&self, id: i32) -> AppResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        conn.transaction::<(), AppError, _>(|conn| {
            async move {
                let deactivated = diesel::update(
                    jobs::table
                        .find(id)
                        .filter(jobs::is_active.eq(true)),
                )
                .set((
                    jobs::is_active.eq(false),
                    jobs::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
                .await?;

                if deactivated == 0 {
                    return Err(AppError::NotFound {
                        entity: "Job".to_string(),
                        field: "id".to_string(),
                        value: id.to_string(),
                    });
                }

                // A non-recurring job that already finished has no schedule
                // row left; that is not an error here.
                diesel::delete(job_schedules::table.filter(job_schedules::job_id.eq(id)))
                    .execute(conn)
                    .await?;

                Ok(())
            }
            .scope_boxed()
        })
        .await
    }
}
