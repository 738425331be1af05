//! Work queue (broker) abstraction.
//!
//! Four logical lanes hand work from the dispatcher to the worker runtime:
//! `ready` (FIFO list), `processing` (claim set), `retrying` (sorted set
//! scored by earliest retry time), and `completed` (bounded list of terminal
//! results). The full serialized message body is stored alongside each claim
//! so that processing-lane membership is always recoverable; removal of the
//! body is the marker for "claim released".

mod error;
mod memory;
mod redis;

pub use self::error::QueueError;
pub use self::memory::MemoryWorkQueue;
pub use self::redis::RedisWorkQueue;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{QueueMessage, QueueResult};

/// Lane cardinalities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct QueueStats {
    pub ready: u64,
    pub processing: u64,
    pub completed: u64,
    pub retrying: u64,
}

/// Durable hand-off between dispatcher and workers.
///
/// Invariant: a `queue_id` is present in at most one of ready, processing,
/// or retrying at any time.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Serialize and append the message to the ready lane.
    async fn enqueue(&self, msg: &QueueMessage) -> Result<(), QueueError>;

    /// Blocking pop of the ready lane head with the given timeout.
    ///
    /// On success the `queue_id` is atomically added to the processing lane
    /// and the body stored under its claim key with the processing TTL.
    async fn claim(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError>;

    /// Release the claim and record a terminal result in the completed lane.
    async fn complete(&self, queue_id: &str, result: &QueueResult) -> Result<(), QueueError>;

    /// Release the claim; defer a retry message into the retrying lane when
    /// the message has retries left, otherwise record a terminal failure.
    async fn fail(&self, msg: &QueueMessage, error: &str) -> Result<(), QueueError>;

    /// Release the claim with no terminal record. Used when the
    /// single-flight guard detects that another attempt owns the job.
    async fn abandon(&self, queue_id: &str) -> Result<(), QueueError>;

    /// Move all retrying members with score <= now back into ready.
    /// Returns the number promoted.
    async fn promote_retries(&self) -> Result<usize, QueueError>;

    /// Remove processing members whose claim body has expired. Returns the
    /// number reaped.
    async fn reap_stale(&self) -> Result<usize, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Broker connectivity probe for health checks.
    async fn ping(&self) -> Result<(), QueueError>;
}
