//! Completion protocol: JobSchedule advancement after a firing settles.
//!
//! Invoked by the worker runtime once a message has reached a terminal
//! outcome (success, or failure after in-lane retries are exhausted). The
//! handler owns all JobSchedule advancement; the dispatcher never advances
//! at enqueue time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::AppResult;
use crate::schedule::ScheduleEngine;
use crate::storage::MetadataStore;

/// Where the worker reports terminal outcomes.
///
/// In this deployment the sink is an in-process handler writing the shared
/// metadata store; a split deployment can substitute an RPC client without
/// touching the worker runtime.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn job_completed(&self, job_id: i32, success: bool) -> AppResult<()>;
}

pub struct CompletionHandler {
    store: Arc<dyn MetadataStore>,
    engine: ScheduleEngine,
}

impl CompletionHandler {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            engine: ScheduleEngine::new(),
        }
    }
}

#[async_trait]
impl CompletionSink for CompletionHandler {
    /// Settles one firing of a job.
    ///
    /// Missing or inactive jobs and missing schedule rows are treated as
    /// already finalized. Non-recurring jobs lose their schedule row on any
    /// terminal outcome; recurring jobs advance to the next occurrence
    /// after the old fire time, regardless of outcome (in-lane retries have
    /// already run by the time this is called).
    async fn job_completed(&self, job_id: i32, success: bool) -> AppResult<()> {
        let Some(job) = self.store.get_job(job_id).await? else {
            tracing::debug!(job_id, "Completion for missing or inactive job, nothing to do");
            return Ok(());
        };

        let Some(schedule) = self.store.get_schedule(job_id).await? else {
            tracing::debug!(job_id, "Completion for already finalized job");
            return Ok(());
        };

        if !job.is_recurring {
            self.store.delete_schedule(job_id).await?;
            tracing::info!(job_id, success, "Non-recurring job finalized, schedule deleted");
            return Ok(());
        }

        // A row already pointing at the future was advanced by an earlier
        // completion of the same firing; a duplicate call is a no-op.
        let now = Utc::now().naive_utc();
        if schedule.next_execution_time > now {
            tracing::debug!(job_id, "Schedule already advanced, skipping");
            return Ok(());
        }

        let old_fire_time = schedule.next_execution_time.and_utc();
        let next = self.engine.next_after(&job.schedule, old_fire_time)?;
        self.store
            .update_schedule(job_id, next.naive_utc())
            .await?;

        tracing::info!(
            job_id,
            success,
            next_execution_time = %next,
            "Recurring job rescheduled"
        );
        Ok(())
    }
}
