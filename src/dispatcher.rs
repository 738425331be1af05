//! Dispatcher: turns due schedule rows into enqueued queue messages.
//!
//! One poll harvests the earliest-due rows joined against active jobs,
//! skips jobs that already have an attempt in flight, and pushes one
//! message per remaining row to the ready lane. `next_execution_time` is
//! left untouched here; advancement belongs to the completion handler, so
//! a re-poll before completion will see the same row again and rely on the
//! worker's single-flight guard.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::DispatcherConfig;
use crate::error::AppResult;
use crate::models::QueueMessage;
use crate::queue::WorkQueue;
use crate::storage::MetadataStore;

pub struct Dispatcher {
    store: Arc<dyn MetadataStore>,
    queue: Arc<dyn WorkQueue>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        queue: Arc<dyn WorkQueue>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    /// One iteration of the loop. Returns the number of messages enqueued.
    ///
    /// A metadata store error aborts the iteration with no side effects; a
    /// broker error stops the batch mid-way and leaves the remaining rows
    /// for the next tick. Either way the schedule rows are untouched.
    pub async fn poll(&self, batch_limit: i64) -> AppResult<usize> {
        let now = Utc::now().naive_utc();
        let due = self.store.due_schedules(now, batch_limit).await?;

        let mut enqueued = 0usize;
        for (schedule, job) in due {
            // Optimization only: the authoritative single-flight check runs
            // in the worker immediately before execution starts.
            match self.store.in_flight_execution(job.id).await {
                Ok(Some(_)) => {
                    tracing::debug!(
                        job_id = job.id,
                        "Skipping enqueue, execution already in flight"
                    );
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(job_id = job.id, error = %e, "Single-flight gate failed");
                    continue;
                }
            }

            let msg = QueueMessage::new(&job, schedule.next_execution_time.and_utc());
            if let Err(e) = self.queue.enqueue(&msg).await {
                tracing::error!(
                    job_id = job.id,
                    queue_id = %msg.queue_id,
                    error = %e,
                    "Enqueue failed, schedule row left for next tick"
                );
                return Err(e.into());
            }

            tracing::debug!(
                job_id = job.id,
                queue_id = %msg.queue_id,
                scheduled_at = %msg.scheduled_at,
                "Dispatched due schedule"
            );
            enqueued += 1;
        }

        Ok(enqueued)
    }

    /// Background loop: polls every `poll_interval_secs` until cancelled,
    /// finishing the in-progress iteration before returning.
    pub async fn run(&self, cancel: CancellationToken) {
        let period = std::time::Duration::from_secs(self.config.poll_interval_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            batch_size = self.config.batch_size,
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Dispatcher stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.poll(self.config.batch_size).await {
                        Ok(0) => {}
                        Ok(count) => {
                            tracing::info!(count, "Dispatched due schedules");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Dispatcher poll failed, retrying next tick");
                        }
                    }
                }
            }
        }
    }
}
