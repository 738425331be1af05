//! In-memory metadata store.
//!
//! Test double for the scheduling core; also usable for single-process
//! development without Postgres. Mirrors the relational semantics the
//! Postgres backend provides: one schedule row per job, append-only
//! executions, soft-deleted jobs invisible to dispatch.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use tokio::sync::Mutex;

use crate::error::AppResult;
use crate::models::{
    ExecutionStatus, Job, JobExecution, JobSchedule, JobType, NewJob, NewJobExecution,
};
use crate::storage::MetadataStore;

#[derive(Default)]
struct Inner {
    jobs: HashMap<i32, Job>,
    schedules: HashMap<i32, JobSchedule>,
    executions: Vec<JobExecution>,
    next_job_id: i32,
    next_schedule_id: i32,
    next_execution_id: i64,
}

#[derive(Default)]
pub struct MemoryMetadataStore {
    inner: Mutex<Inner>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a job with its schedule row, like the transactional create.
    pub async fn insert_job(&self, new_job: NewJob, next_execution_time: NaiveDateTime) -> Job {
        let mut inner = self.inner.lock().await;
        inner.next_job_id += 1;
        inner.next_schedule_id += 1;

        let now = Utc::now().naive_utc();
        let job = Job {
            id: inner.next_job_id,
            schedule: new_job.schedule,
            target_url: new_job.target_url,
            job_type: new_job.job_type,
            is_recurring: new_job.is_recurring,
            is_active: new_job.is_active,
            description: new_job.description,
            max_retry_count: new_job.max_retry_count,
            created_at: now,
            updated_at: now,
        };
        let schedule = JobSchedule {
            id: inner.next_schedule_id,
            job_id: job.id,
            next_execution_time,
            created_at: now,
        };

        inner.jobs.insert(job.id, job.clone());
        inner.schedules.insert(job.id, schedule);
        job
    }

    /// Convenience constructor for tests.
    pub async fn insert_simple_job(
        &self,
        schedule: &str,
        job_type: JobType,
        is_recurring: bool,
        max_retry_count: i32,
        next_execution_time: NaiveDateTime,
    ) -> Job {
        self.insert_job(
            NewJob {
                schedule: schedule.to_string(),
                target_url: "http://localhost:19999/hook".to_string(),
                job_type,
                is_recurring,
                is_active: true,
                description: None,
                max_retry_count,
            },
            next_execution_time,
        )
        .await
    }

    pub async fn deactivate_job(&self, job_id: i32) {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.is_active = false;
        }
        inner.schedules.remove(&job_id);
    }

    pub async fn executions_for(&self, job_id: i32) -> Vec<JobExecution> {
        let inner = self.inner.lock().await;
        inner
            .executions
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }

    pub async fn schedule_for(&self, job_id: i32) -> Option<JobSchedule> {
        let inner = self.inner.lock().await;
        inner.schedules.get(&job_id).cloned()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn due_schedules(
        &self,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<(JobSchedule, Job)>> {
        let inner = self.inner.lock().await;
        let mut due: Vec<(JobSchedule, Job)> = inner
            .schedules
            .values()
            .filter(|s| s.next_execution_time <= now)
            .filter_map(|s| {
                inner
                    .jobs
                    .get(&s.job_id)
                    .filter(|j| j.is_active)
                    .map(|j| (s.clone(), j.clone()))
            })
            .collect();

        due.sort_by_key(|(s, _)| s.next_execution_time);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn in_flight_execution(&self, job_id: i32) -> AppResult<Option<JobExecution>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .executions
            .iter()
            .find(|e| e.job_id == job_id && e.status.is_in_flight())
            .cloned())
    }

    async fn create_execution(&self, exec: NewJobExecution) -> AppResult<JobExecution> {
        let mut inner = self.inner.lock().await;
        inner.next_execution_id += 1;

        let now = Utc::now().naive_utc();
        let execution = JobExecution {
            id: inner.next_execution_id,
            job_id: exec.job_id,
            status: exec.status,
            error: None,
            execution_time: exec.execution_time,
            execution_duration_ns: None,
            retry_count: exec.retry_count,
            created_at: now,
            updated_at: now,
        };
        inner.executions.push(execution.clone());
        Ok(execution)
    }

    async fn mark_execution_running(&self, id: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(execution) = inner.executions.iter_mut().find(|e| e.id == id) {
            execution.status = ExecutionStatus::Running;
            execution.updated_at = Utc::now().naive_utc();
        }
        Ok(())
    }

    async fn finalize_execution(
        &self,
        id: i64,
        status: ExecutionStatus,
        error: Option<String>,
        duration_ns: i64,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(execution) = inner.executions.iter_mut().find(|e| e.id == id) {
            execution.status = status;
            execution.error = error;
            execution.execution_duration_ns = Some(duration_ns);
            execution.updated_at = Utc::now().naive_utc();
        }
        Ok(())
    }

    async fn get_job(&self, id: i32) -> AppResult<Option<Job>> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&id).filter(|j| j.is_active).cloned())
    }

    async fn get_schedule(&self, job_id: i32) -> AppResult<Option<JobSchedule>> {
        let inner = self.inner.lock().await;
        Ok(inner.schedules.get(&job_id).cloned())
    }

    async fn update_schedule(
        &self,
        job_id: i32,
        next_execution_time: NaiveDateTime,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(schedule) = inner.schedules.get_mut(&job_id) {
            schedule.next_execution_time = next_execution_time;
        }
        Ok(())
    }

    async fn delete_schedule(&self, job_id: i32) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.schedules.remove(&job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn due_schedules_filters_inactive_and_future() {
        let store = MemoryMetadataStore::new();
        let now = Utc::now().naive_utc();

        let due = store
            .insert_simple_job("*/10 * * * * *", JobType::AtLeastOnce, true, 3, now)
            .await;
        let future = store
            .insert_simple_job(
                "*/10 * * * * *",
                JobType::AtLeastOnce,
                true,
                3,
                now + Duration::hours(1),
            )
            .await;
        let deleted = store
            .insert_simple_job("*/10 * * * * *", JobType::AtLeastOnce, true, 3, now)
            .await;
        store.deactivate_job(deleted.id).await;

        let harvested = store.due_schedules(now, 100).await.unwrap();
        let ids: Vec<i32> = harvested.iter().map(|(_, j)| j.id).collect();
        assert_eq!(ids, vec![due.id]);
        assert!(!ids.contains(&future.id));
    }

    #[tokio::test]
    async fn due_schedules_orders_by_fire_time_and_honors_limit() {
        let store = MemoryMetadataStore::new();
        let now = Utc::now().naive_utc();

        let late = store
            .insert_simple_job(
                "*/10 * * * * *",
                JobType::AtLeastOnce,
                true,
                3,
                now - Duration::seconds(5),
            )
            .await;
        let early = store
            .insert_simple_job(
                "*/10 * * * * *",
                JobType::AtLeastOnce,
                true,
                3,
                now - Duration::seconds(50),
            )
            .await;

        let harvested = store.due_schedules(now, 1).await.unwrap();
        assert_eq!(harvested.len(), 1);
        assert_eq!(harvested[0].1.id, early.id);

        let all = store.due_schedules(now, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].1.id, late.id);
    }

    #[tokio::test]
    async fn in_flight_sees_scheduled_and_running_only() {
        let store = MemoryMetadataStore::new();
        let now = Utc::now().naive_utc();
        let job = store
            .insert_simple_job("*/10 * * * * *", JobType::AtLeastOnce, true, 3, now)
            .await;

        assert!(store.in_flight_execution(job.id).await.unwrap().is_none());

        let exec = store
            .create_execution(NewJobExecution {
                job_id: job.id,
                status: ExecutionStatus::Scheduled,
                execution_time: now,
                retry_count: 0,
            })
            .await
            .unwrap();
        assert!(store.in_flight_execution(job.id).await.unwrap().is_some());

        store.mark_execution_running(exec.id).await.unwrap();
        assert!(store.in_flight_execution(job.id).await.unwrap().is_some());

        store
            .finalize_execution(exec.id, ExecutionStatus::Success, None, 1_000_000)
            .await
            .unwrap();
        assert!(store.in_flight_execution(job.id).await.unwrap().is_none());
    }
}
