//! Shared HTTP client for webhook execution.
//!
//! One pooled client per worker process; per-call deadlines come from the
//! queue message, the builder timeout is only the outer default.

use std::time::Duration;

use crate::error::{AppError, AppResult};

pub fn build_client(default_timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(default_timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("metronome/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })
}
