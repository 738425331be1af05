//! Worker runtime: bounded-concurrency execution of queued messages.
//!
//! A claim loop pops the ready lane, acquires one of `pool_size` permits,
//! and runs each execution on its own task. A maintenance task promotes due
//! retries and reaps stale claims. Shutdown is cooperative: claiming stops
//! immediately, in-flight executions drain.

mod http;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::completion::{CompletionHandler, CompletionSink};
use crate::config::{QueueConfig, Settings, WorkerConfig};
use crate::db::establish_async_connection_pool;
use crate::error::AppResult;
use crate::models::{
    ExecutionStatus, NewJobExecution, QueueMessage, QueueResult, QueueResultStatus,
};
use crate::queue::{QueueStats, RedisWorkQueue, WorkQueue};
use crate::storage::{MetadataStore, PgMetadataStore};

/// Snapshot of the runtime for diagnostics.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub active: usize,
    pub capacity: usize,
    pub queue: QueueStats,
    pub shutting_down: bool,
}

pub struct WorkerRuntime {
    store: Arc<dyn MetadataStore>,
    queue: Arc<dyn WorkQueue>,
    completion: Arc<dyn CompletionSink>,
    http: reqwest::Client,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
    active: Arc<AtomicUsize>,
    config: WorkerConfig,
    maintenance_interval: Duration,
}

impl WorkerRuntime {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        queue: Arc<dyn WorkQueue>,
        completion: Arc<dyn CompletionSink>,
        config: WorkerConfig,
        queue_config: &QueueConfig,
    ) -> AppResult<Arc<Self>> {
        let http = http::build_client(Duration::from_secs(config.http_timeout_secs))?;

        Ok(Arc::new(Self {
            store,
            queue,
            completion,
            http,
            permits: Arc::new(Semaphore::new(config.pool_size)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
            active: Arc::new(AtomicUsize::new(0)),
            config,
            maintenance_interval: Duration::from_secs(queue_config.maintenance_interval_secs),
        }))
    }

    /// Launches the claim loop and the maintenance task. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!(
            pool_size = self.config.pool_size,
            http_timeout_secs = self.config.http_timeout_secs,
            "Worker runtime started"
        );

        let runtime = self.clone();
        self.tracker.spawn(async move { runtime.claim_loop().await });

        let runtime = self.clone();
        self.tracker
            .spawn(async move { runtime.maintenance_loop().await });
    }

    /// Cooperative drain: stop claiming, let in-flight executions finish,
    /// then return. Safe to call concurrently and repeatedly.
    pub async fn stop(&self) {
        tracing::info!("Stopping worker runtime...");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Worker runtime stopped");
    }

    pub async fn stats(&self) -> WorkerStats {
        let queue = self.queue.stats().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to read queue stats");
            QueueStats::default()
        });

        WorkerStats {
            active: self.active.load(Ordering::SeqCst),
            capacity: self.config.pool_size,
            queue,
            shutting_down: self.cancel.is_cancelled(),
        }
    }

    async fn claim_loop(self: Arc<Self>) {
        let wait = Duration::from_secs(self.config.claim_wait_secs.max(1));

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            let msg = match self.queue.claim(wait).await {
                Ok(Some(msg)) => msg,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Claim failed");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            let permit = tokio::select! {
                _ = self.cancel.cancelled() => {
                    // Put the claimed message back for another worker
                    // instead of holding it across shutdown.
                    if let Err(e) = self.queue.abandon(&msg.queue_id).await {
                        tracing::warn!(queue_id = %msg.queue_id, error = %e, "Failed to release claim on shutdown");
                    }
                    if let Err(e) = self.queue.enqueue(&msg).await {
                        tracing::warn!(queue_id = %msg.queue_id, error = %e, "Failed to re-enqueue on shutdown");
                    }
                    return;
                }
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            let runtime = self.clone();
            self.tracker
                .spawn(async move { runtime.process(msg, permit).await });
        }
    }

    async fn maintenance_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.maintenance_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(e) = self.queue.promote_retries().await {
                        tracing::error!(error = %e, "Retry promotion failed");
                    }
                    if let Err(e) = self.queue.reap_stale().await {
                        tracing::error!(error = %e, "Stale claim reaping failed");
                    }
                }
            }
        }
    }

    /// Executes a single claimed message end to end.
    async fn process(self: Arc<Self>, msg: QueueMessage, _permit: OwnedSemaphorePermit) {
        self.active.fetch_add(1, Ordering::SeqCst);
        let result = self.execute(&msg).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = result {
            tracing::error!(queue_id = %msg.queue_id, job_id = msg.job_id, error = %e, "Execution pipeline error");
        }
    }

    async fn execute(&self, msg: &QueueMessage) -> AppResult<()> {
        tracing::info!(
            queue_id = %msg.queue_id,
            job_id = msg.job_id,
            attempt = msg.retry_count + 1,
            max_attempts = msg.max_retry_count + 1,
            "Processing message"
        );

        // Authoritative single-flight guard: at most one non-terminal
        // execution per job. The other in-flight attempt owns the job, so
        // this duplicate leaves no retry or completed record.
        match self.store.in_flight_execution(msg.job_id).await {
            Ok(Some(existing)) => {
                tracing::info!(
                    queue_id = %msg.queue_id,
                    job_id = msg.job_id,
                    existing_execution = existing.id,
                    "Execution already in flight, abandoning duplicate"
                );
                self.queue.abandon(&msg.queue_id).await?;
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(queue_id = %msg.queue_id, error = %e, "Single-flight check failed");
                self.queue
                    .fail(msg, &format!("Single-flight check failed: {}", e))
                    .await?;
                return Ok(());
            }
        }

        let execution = match self
            .store
            .create_execution(NewJobExecution {
                job_id: msg.job_id,
                status: ExecutionStatus::Scheduled,
                execution_time: Utc::now().naive_utc(),
                retry_count: msg.retry_count,
            })
            .await
        {
            Ok(execution) => execution,
            Err(e) => {
                tracing::error!(queue_id = %msg.queue_id, error = %e, "Failed to create execution record");
                self.queue
                    .fail(msg, &format!("Failed to create execution record: {}", e))
                    .await?;
                return Ok(());
            }
        };

        if let Err(e) = self.store.mark_execution_running(execution.id).await {
            tracing::warn!(execution_id = execution.id, error = %e, "Failed to mark execution running");
        }

        let started = Instant::now();
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => {
                // Drain window elapsed mid-call: abandon the attempt. The
                // RUNNING row stays behind for the single-flight guard and
                // operator aging.
                tracing::warn!(
                    queue_id = %msg.queue_id,
                    execution_id = execution.id,
                    "Shutdown during HTTP call, abandoning attempt"
                );
                return Ok(());
            }
            outcome = self.call_target(msg) => outcome,
        };
        let duration_ns = started.elapsed().as_nanos() as i64;

        let (status, error) = match &outcome {
            Ok(()) => (ExecutionStatus::Success, None),
            Err(reason) => (ExecutionStatus::Failed, Some(reason.clone())),
        };

        if let Err(e) = self
            .store
            .finalize_execution(execution.id, status, error.clone(), duration_ns)
            .await
        {
            tracing::error!(execution_id = execution.id, error = %e, "Failed to finalize execution");
        }

        // Broker first (releases the claim), then the completion protocol
        // (advances or deletes the schedule row).
        match outcome {
            Ok(()) => {
                tracing::info!(
                    queue_id = %msg.queue_id,
                    job_id = msg.job_id,
                    attempt = msg.retry_count + 1,
                    duration_ms = duration_ns / 1_000_000,
                    "Execution succeeded"
                );

                let result = QueueResult {
                    queue_id: msg.queue_id.clone(),
                    job_id: msg.job_id,
                    status: QueueResultStatus::Completed,
                    success: true,
                    error: None,
                    execution_time: Utc::now(),
                    execution_duration_ns: Some(duration_ns),
                    retry_count: msg.retry_count,
                };
                self.queue.complete(&msg.queue_id, &result).await?;

                if let Err(e) = self.completion.job_completed(msg.job_id, true).await {
                    tracing::error!(job_id = msg.job_id, error = %e, "Completion handler failed");
                }
            }
            Err(reason) => {
                tracing::warn!(
                    queue_id = %msg.queue_id,
                    job_id = msg.job_id,
                    attempt = msg.retry_count + 1,
                    max_attempts = msg.max_retry_count + 1,
                    error = %reason,
                    "Execution failed"
                );

                let terminal = !msg.should_retry();
                self.queue.fail(msg, &reason).await?;

                // Retryable failures settle inside the work queue; the
                // schedule only moves once this firing is terminal.
                if terminal {
                    if let Err(e) = self.completion.job_completed(msg.job_id, false).await {
                        tracing::error!(job_id = msg.job_id, error = %e, "Completion handler failed");
                    }
                }
            }
        }

        Ok(())
    }

    /// POST with an empty body; success is any 2xx status. Network errors,
    /// non-2xx responses, and deadline expiry all count as failure.
    async fn call_target(&self, msg: &QueueMessage) -> Result<(), String> {
        let deadline = Duration::from_secs(msg.timeout_seconds);

        match self
            .http
            .post(&msg.target_url)
            .timeout(deadline)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(format!("Target returned status {}", response.status())),
            Err(e) if e.is_timeout() => {
                Err(format!("Request timed out after {}s", msg.timeout_seconds))
            }
            Err(e) => Err(format!("Request failed: {}", e)),
        }
    }
}

/// Entry point for the worker process role: wires the shared stores, runs
/// the runtime until a shutdown signal arrives, then drains.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let pool = establish_async_connection_pool(&settings.database).await?;
    let store: Arc<dyn MetadataStore> = Arc::new(PgMetadataStore::new(pool));

    let queue: Arc<dyn WorkQueue> =
        Arc::new(RedisWorkQueue::new(&settings.redis, &settings.queue).await?);
    queue.ping().await?;

    let completion: Arc<dyn CompletionSink> = Arc::new(CompletionHandler::new(store.clone()));

    let runtime = WorkerRuntime::new(
        store,
        queue,
        completion,
        settings.worker.clone(),
        &settings.queue,
    )?;
    runtime.start();

    crate::server::shutdown_signal().await;
    runtime.stop().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::models::JobType;
    use crate::queue::MemoryWorkQueue;
    use crate::storage::MemoryMetadataStore;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use chrono::Duration as ChronoDuration;
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicI32;

    /// Stub webhook target that returns 500 for the first `failures`
    /// requests and 200 afterwards.
    async fn spawn_target(failures: i32) -> (SocketAddr, Arc<AtomicI32>) {
        let hits = Arc::new(AtomicI32::new(0));

        async fn hook(State(state): State<(Arc<AtomicI32>, i32)>) -> StatusCode {
            let (hits, failures) = state;
            let n = hits.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            }
        }

        let app = Router::new()
            .route("/hook", post(hook))
            .with_state((hits.clone(), failures));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (addr, hits)
    }

    struct Harness {
        store: Arc<MemoryMetadataStore>,
        queue: Arc<MemoryWorkQueue>,
        runtime: Arc<WorkerRuntime>,
    }

    fn harness() -> Harness {
        // Fast maintenance so retry promotion happens within test budgets.
        let queue_config = QueueConfig {
            maintenance_interval_secs: 1,
            ..QueueConfig::default()
        };

        let store = Arc::new(MemoryMetadataStore::new());
        let queue = Arc::new(MemoryWorkQueue::new(&queue_config));
        let completion: Arc<dyn CompletionSink> = Arc::new(CompletionHandler::new(
            store.clone() as Arc<dyn MetadataStore>,
        ));

        let runtime = WorkerRuntime::new(
            store.clone() as Arc<dyn MetadataStore>,
            queue.clone() as Arc<dyn WorkQueue>,
            completion,
            WorkerConfig::default(),
            &queue_config,
        )
        .unwrap();

        Harness {
            store,
            queue,
            runtime,
        }
    }

    async fn wait_for<F, Fut>(mut probe: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if probe().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        false
    }

    fn message_for(job: &crate::models::Job, target: SocketAddr) -> QueueMessage {
        let mut msg = QueueMessage::new(job, Utc::now());
        msg.target_url = format!("http://{}/hook", target);
        msg
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn successful_execution_records_success_and_advances_schedule() {
        let (target, hits) = spawn_target(0).await;
        let h = harness();

        let old_fire = Utc::now().naive_utc() - ChronoDuration::seconds(2);
        let job = h
            .store
            .insert_simple_job("*/10 * * * * *", JobType::AtLeastOnce, true, 2, old_fire)
            .await;

        h.queue.enqueue(&message_for(&job, target)).await.unwrap();
        h.runtime.start();

        let done = wait_for(
            || async {
                h.store
                    .executions_for(job.id)
                    .await
                    .iter()
                    .any(|e| e.status == ExecutionStatus::Success)
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(done, "execution should succeed");

        h.runtime.stop().await;

        let executions = h.store.executions_for(job.id).await;
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].retry_count, 0);
        assert!(executions[0].execution_duration_ns.unwrap() > 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Completion advanced the recurring schedule past the old fire.
        let schedule = h.store.schedule_for(job.id).await.unwrap();
        assert!(schedule.next_execution_time > old_fire);

        // Claim released, terminal result recorded.
        let stats = h.queue.stats().await.unwrap();
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.completed, 1);
        assert!(h.queue.completed_results().await[0].success);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retries_then_success_produces_failed_failed_success() {
        let (target, _) = spawn_target(2).await;
        let h = harness();

        let job = h
            .store
            .insert_simple_job(
                "*/10 * * * * *",
                JobType::AtLeastOnce,
                true,
                2,
                Utc::now().naive_utc() - ChronoDuration::seconds(1),
            )
            .await;

        h.queue.enqueue(&message_for(&job, target)).await.unwrap();
        h.runtime.start();

        let done = wait_for(
            || async {
                h.store
                    .executions_for(job.id)
                    .await
                    .iter()
                    .any(|e| e.status == ExecutionStatus::Success)
            },
            Duration::from_secs(10),
        )
        .await;
        assert!(done, "third attempt should succeed");

        h.runtime.stop().await;

        let mut executions = h.store.executions_for(job.id).await;
        executions.sort_by_key(|e| e.retry_count);
        let statuses: Vec<(i32, ExecutionStatus)> = executions
            .iter()
            .map(|e| (e.retry_count, e.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (0, ExecutionStatus::Failed),
                (1, ExecutionStatus::Failed),
                (2, ExecutionStatus::Success),
            ]
        );
        assert!(executions[0].error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn at_most_once_failure_is_terminal_and_deletes_schedule() {
        let (target, hits) = spawn_target(i32::MAX).await;
        let h = harness();

        // maxRetryCount is ignored for AT_MOST_ONCE.
        let job = h
            .store
            .insert_simple_job(
                "0 0 12 * * *",
                JobType::AtMostOnce,
                false,
                5,
                Utc::now().naive_utc() - ChronoDuration::seconds(1),
            )
            .await;

        h.queue.enqueue(&message_for(&job, target)).await.unwrap();
        h.runtime.start();

        let done = wait_for(
            || async {
                h.store
                    .executions_for(job.id)
                    .await
                    .iter()
                    .any(|e| e.status == ExecutionStatus::Failed)
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(done);

        // Give the terminal completion a moment to settle, then stop.
        let gone = wait_for(
            || async { h.store.schedule_for(job.id).await.is_none() },
            Duration::from_secs(5),
        )
        .await;
        h.runtime.stop().await;

        assert!(gone, "non-recurring schedule row must be deleted");
        let executions = h.store.executions_for(job.id).await;
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].retry_count, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let stats = h.queue.stats().await.unwrap();
        assert_eq!(stats.retrying, 0);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_message_is_abandoned_by_single_flight_guard() {
        let (target, hits) = spawn_target(0).await;
        let h = harness();

        let job = h
            .store
            .insert_simple_job(
                "*/10 * * * * *",
                JobType::AtLeastOnce,
                true,
                2,
                Utc::now().naive_utc(),
            )
            .await;

        // Another attempt already owns the job.
        h.store
            .create_execution(NewJobExecution {
                job_id: job.id,
                status: ExecutionStatus::Running,
                execution_time: Utc::now().naive_utc(),
                retry_count: 0,
            })
            .await
            .unwrap();

        h.queue.enqueue(&message_for(&job, target)).await.unwrap();
        h.runtime.start();

        let drained = wait_for(
            || async {
                let stats = h.queue.stats().await.unwrap();
                stats.ready == 0 && stats.processing == 0
            },
            Duration::from_secs(5),
        )
        .await;
        h.runtime.stop().await;

        assert!(drained, "duplicate must leave no lane residue");
        assert_eq!(hits.load(Ordering::SeqCst), 0, "target must not be called");
        // Only the pre-existing RUNNING row remains.
        assert_eq!(h.store.executions_for(job.id).await.len(), 1);
        assert_eq!(h.queue.stats().await.unwrap().retrying, 0);
        assert_eq!(h.queue.stats().await.unwrap().completed, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_is_idempotent_and_concurrent_safe() {
        let h = harness();
        h.runtime.start();
        // Starting twice must not spawn a second claim loop.
        h.runtime.start();

        tokio::join!(h.runtime.stop(), h.runtime.stop());
        h.runtime.stop().await;

        assert!(h.runtime.stats().await.shutting_down);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stats_report_capacity_and_lanes() {
        let h = harness();
        let stats = h.runtime.stats().await;
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.active, 0);
        assert!(!stats.shutting_down);
        assert_eq!(stats.queue, QueueStats::default());
    }
}
