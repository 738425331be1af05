//! Metronome
//!
//! A distributed CRON-style job scheduler: second-precision schedules,
//! webhook execution on a horizontally scalable worker pool, configurable
//! delivery semantics, and append-only execution history.

pub mod api;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod logger;
pub mod models;
pub mod queue;
pub mod repositories;
pub mod schedule;
pub mod schema;
pub mod server;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;
pub mod worker;

pub use state::AppState;

/// Crate version, used by configuration defaults and the CLI.
pub fn pkg_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
