//! Request handlers for the admin API.

pub mod health;
pub mod jobs;
pub mod queue;
