//! In-memory work queue.
//!
//! Single-process backend with the same lane semantics as the Redis queue.
//! Used by the test suite and for development without a broker.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::config::QueueConfig;
use crate::models::{QueueMessage, QueueResult, QueueResultStatus};
use crate::queue::{QueueError, QueueStats, WorkQueue};

#[derive(Default)]
struct Inner {
    ready: VecDeque<String>,
    /// queue_id -> claim expiry (the moment the body TTL would lapse)
    processing: HashMap<String, Instant>,
    /// (due unix seconds, serialized retry message)
    retrying: Vec<(i64, String)>,
    completed: VecDeque<String>,
}

pub struct MemoryWorkQueue {
    inner: Mutex<Inner>,
    ready_notify: Notify,
    processing_ttl: Duration,
    completed_cap: usize,
    retry_max_delay: Duration,
}

impl MemoryWorkQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ready_notify: Notify::new(),
            processing_ttl: Duration::from_secs(config.processing_ttl_secs),
            completed_cap: config.completed_cap,
            retry_max_delay: Duration::from_secs(config.retry_max_delay_secs),
        }
    }

    fn push_completed(&self, inner: &mut Inner, result: &QueueResult) -> Result<(), QueueError> {
        let data = serde_json::to_string(result)?;
        inner.completed.push_front(data);
        inner.completed.truncate(self.completed_cap);
        Ok(())
    }

    /// Terminal results in the completed lane, newest first.
    pub async fn completed_results(&self) -> Vec<QueueResult> {
        let inner = self.inner.lock().await;
        inner
            .completed
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }

    /// Deferred retry messages with their due times.
    pub async fn retrying_snapshot(&self) -> Vec<(i64, QueueMessage)> {
        let inner = self.inner.lock().await;
        inner
            .retrying
            .iter()
            .filter_map(|(due, raw)| {
                QueueMessage::deserialize(raw).ok().map(|msg| (*due, msg))
            })
            .collect()
    }
}

#[cfg(test)]
impl MemoryWorkQueue {
    /// Makes every deferred retry immediately due, so tests can drive the
    /// promoter without waiting out real backoff delays.
    pub async fn backdate_retries(&self) {
        let mut inner = self.inner.lock().await;
        let past = Utc::now().timestamp() - 1;
        for entry in inner.retrying.iter_mut() {
            entry.0 = past;
        }
    }

    /// Expires every claim body, as if the processing TTL had elapsed.
    pub async fn expire_claims(&self) {
        let mut inner = self.inner.lock().await;
        let past = Instant::now() - Duration::from_secs(1);
        for expiry in inner.processing.values_mut() {
            *expiry = past;
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, msg: &QueueMessage) -> Result<(), QueueError> {
        let data = msg.serialize()?;
        {
            let mut inner = self.inner.lock().await;
            inner.ready.push_front(data);
        }
        self.ready_notify.notify_one();
        Ok(())
    }

    async fn claim(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(raw) = inner.ready.pop_back() {
                    let msg = QueueMessage::deserialize(&raw)?;
                    inner
                        .processing
                        .insert(msg.queue_id.clone(), Instant::now() + self.processing_ttl);
                    return Ok(Some(msg));
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            tokio::select! {
                _ = self.ready_notify.notified() => {}
                _ = tokio::time::sleep(remaining) => return Ok(None),
            }
        }
    }

    async fn complete(&self, queue_id: &str, result: &QueueResult) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        inner.processing.remove(queue_id);
        self.push_completed(&mut inner, result)
    }

    async fn fail(&self, msg: &QueueMessage, error: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        inner.processing.remove(&msg.queue_id);

        if msg.should_retry() {
            let retry = msg.retry();
            let delay = msg.retry_delay().min(self.retry_max_delay);
            let due = Utc::now().timestamp() + delay.as_secs() as i64;
            inner.retrying.push((due, retry.serialize()?));
            Ok(())
        } else {
            let result = QueueResult {
                queue_id: msg.queue_id.clone(),
                job_id: msg.job_id,
                status: QueueResultStatus::Failed,
                success: false,
                error: Some(error.to_string()),
                execution_time: Utc::now(),
                execution_duration_ns: None,
                retry_count: msg.retry_count,
            };
            self.push_completed(&mut inner, &result)
        }
    }

    async fn abandon(&self, queue_id: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        inner.processing.remove(queue_id);
        Ok(())
    }

    async fn promote_retries(&self) -> Result<usize, QueueError> {
        let promoted = {
            let mut inner = self.inner.lock().await;
            let now = Utc::now().timestamp();

            let (due, pending): (Vec<_>, Vec<_>) = inner
                .retrying
                .drain(..)
                .partition(|(score, _)| *score <= now);
            inner.retrying = pending;

            for (_, raw) in &due {
                inner.ready.push_front(raw.clone());
            }
            due.len()
        };

        for _ in 0..promoted {
            self.ready_notify.notify_one();
        }
        Ok(promoted)
    }

    async fn reap_stale(&self) -> Result<usize, QueueError> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let before = inner.processing.len();
        inner.processing.retain(|_, expiry| *expiry > now);
        Ok(before - inner.processing.len())
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let inner = self.inner.lock().await;
        Ok(QueueStats {
            ready: inner.ready.len() as u64,
            processing: inner.processing.len() as u64,
            completed: inner.completed.len() as u64,
            retrying: inner.retrying.len() as u64,
        })
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
