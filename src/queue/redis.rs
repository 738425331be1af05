//! Redis-backed work queue using a bb8 connection pool.
//!
//! Lane keys:
//! - `job_queue:ready`: list
//! - `job_queue:processing`: set of queue ids
//! - `job_queue:retrying`: sorted set, score = earliest retry unix time
//! - `job_queue:completed`: list, trimmed to the completed cap
//! - `job_data:{queue_id}`: string body with the processing TTL

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis::{self, AsyncCommands};
use bb8_redis::RedisConnectionManager;
use chrono::Utc;

use crate::config::{QueueConfig, RedisConfig};
use crate::models::{QueueMessage, QueueResult, QueueResultStatus};
use crate::queue::{QueueError, QueueStats, WorkQueue};

const QUEUE_READY: &str = "job_queue:ready";
const QUEUE_PROCESSING: &str = "job_queue:processing";
const QUEUE_RETRYING: &str = "job_queue:retrying";
const QUEUE_COMPLETED: &str = "job_queue:completed";
const JOB_DATA_PREFIX: &str = "job_data:";

type RedisPool = Pool<RedisConnectionManager>;

pub struct RedisWorkQueue {
    pool: RedisPool,
    processing_ttl: Duration,
    completed_cap: usize,
    retry_max_delay: Duration,
}

fn job_data_key(queue_id: &str) -> String {
    format!("{}{}", JOB_DATA_PREFIX, queue_id)
}

impl RedisWorkQueue {
    pub async fn new(redis: &RedisConfig, queue: &QueueConfig) -> Result<Self, QueueError> {
        let manager = RedisConnectionManager::new(redis.url.as_str())
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(redis.pool_size)
            .connection_timeout(Duration::from_secs(redis.connection_timeout))
            .build(manager)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            processing_ttl: Duration::from_secs(queue.processing_ttl_secs),
            completed_cap: queue.completed_cap,
            retry_max_delay: Duration::from_secs(queue.retry_max_delay_secs),
        })
    }

    async fn get_conn(&self) -> Result<PooledConnection<'_, RedisConnectionManager>, QueueError> {
        self.pool
            .get()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))
    }

    async fn push_completed(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        result: &QueueResult,
    ) -> Result<(), QueueError> {
        let data = serde_json::to_string(result)?;
        redis::pipe()
            .atomic()
            .lpush(QUEUE_COMPLETED, data)
            .ignore()
            .ltrim(QUEUE_COMPLETED, 0, self.completed_cap as isize - 1)
            .ignore()
            .query_async::<()>(conn)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }

    async fn release_claim(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue_id: &str,
    ) -> Result<(), QueueError> {
        redis::pipe()
            .atomic()
            .srem(QUEUE_PROCESSING, queue_id)
            .ignore()
            .del(job_data_key(queue_id))
            .ignore()
            .query_async::<()>(conn)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue(&self, msg: &QueueMessage) -> Result<(), QueueError> {
        let data = msg.serialize()?;
        let mut conn = self.get_conn().await?;

        conn.lpush::<_, _, ()>(QUEUE_READY, data)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        tracing::debug!(queue_id = %msg.queue_id, job_id = msg.job_id, "Enqueued message");
        Ok(())
    }

    async fn claim(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let mut conn = self.get_conn().await?;

        let popped: Option<(String, String)> = conn
            .brpop(QUEUE_READY, wait.as_secs_f64())
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        let Some((_, raw)) = popped else {
            return Ok(None);
        };

        let msg = QueueMessage::deserialize(&raw)?;

        // Register the claim in one round-trip so that a processing-lane
        // member always has a recoverable body.
        redis::pipe()
            .atomic()
            .sadd(QUEUE_PROCESSING, &msg.queue_id)
            .ignore()
            .set_ex(job_data_key(&msg.queue_id), &raw, self.processing_ttl.as_secs())
            .ignore()
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        Ok(Some(msg))
    }

    async fn complete(&self, queue_id: &str, result: &QueueResult) -> Result<(), QueueError> {
        let mut conn = self.get_conn().await?;
        self.release_claim(&mut conn, queue_id).await?;
        self.push_completed(&mut conn, result).await?;

        tracing::debug!(queue_id = %queue_id, status = ?result.status, "Completed message");
        Ok(())
    }

    async fn fail(&self, msg: &QueueMessage, error: &str) -> Result<(), QueueError> {
        let mut conn = self.get_conn().await?;
        self.release_claim(&mut conn, &msg.queue_id).await?;

        if msg.should_retry() {
            let retry = msg.retry();
            let delay = msg.retry_delay().min(self.retry_max_delay);
            let due = Utc::now().timestamp() + delay.as_secs() as i64;
            let data = retry.serialize()?;

            conn.zadd::<_, _, _, ()>(QUEUE_RETRYING, data, due)
                .await
                .map_err(|e| QueueError::Operation(e.to_string()))?;

            tracing::info!(
                queue_id = %msg.queue_id,
                job_id = msg.job_id,
                retry = retry.retry_count,
                max_retries = msg.max_retry_count,
                delay_secs = delay.as_secs(),
                "Scheduled retry"
            );
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
            self.push_completed(&mut conn, &result).await?;

            tracing::warn!(
                queue_id = %msg.queue_id,
                job_id = msg.job_id,
                retries = msg.retry_count,
                "Message terminally failed"
            );
        }

        Ok(())
    }

    async fn abandon(&self, queue_id: &str) -> Result<(), QueueError> {
        let mut conn = self.get_conn().await?;
        self.release_claim(&mut conn, queue_id).await?;
        tracing::debug!(queue_id = %queue_id, "Abandoned duplicate message");
        Ok(())
    }

    async fn promote_retries(&self) -> Result<usize, QueueError> {
        let mut conn = self.get_conn().await?;
        let now = Utc::now().timestamp();

        let due: Vec<String> = conn
            .zrangebyscore(QUEUE_RETRYING, "-inf", now)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        for raw in &due {
            // Remove-and-reinsert atomically per member so a crashed
            // promoter never duplicates a message across lanes.
            redis::pipe()
                .atomic()
                .zrem(QUEUE_RETRYING, raw)
                .ignore()
                .lpush(QUEUE_READY, raw)
                .ignore()
                .query_async::<()>(&mut *conn)
                .await
                .map_err(|e| QueueError::Operation(e.to_string()))?;
        }

        if !due.is_empty() {
            tracing::info!(count = due.len(), "Promoted retry messages to ready");
        }
        Ok(due.len())
    }

    async fn reap_stale(&self) -> Result<usize, QueueError> {
        let mut conn = self.get_conn().await?;

        let members: Vec<String> = conn
            .smembers(QUEUE_PROCESSING)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        let mut reaped = 0usize;
        for queue_id in members {
            let exists: bool = conn
                .exists(job_data_key(&queue_id))
                .await
                .map_err(|e| QueueError::Operation(e.to_string()))?;

            if !exists {
                let removed: i64 = conn
                    .srem(QUEUE_PROCESSING, &queue_id)
                    .await
                    .map_err(|e| QueueError::Operation(e.to_string()))?;
                reaped += removed as usize;
            }
        }

        if reaped > 0 {
            tracing::warn!(count = reaped, "Reaped stale processing claims");
        }
        Ok(reaped)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut conn = self.get_conn().await?;

        let ready: u64 = conn
            .llen(QUEUE_READY)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        let processing: u64 = conn
            .scard(QUEUE_PROCESSING)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        let completed: u64 = conn
            .llen(QUEUE_COMPLETED)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;
        let retrying: u64 = conn
            .zcard(QUEUE_RETRYING)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        Ok(QueueStats {
            ready,
            processing,
            completed,
            retrying,
        })
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        Ok(())
    }
}
