//! Work queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Broker connection error: {0}")]
    Connection(String),

    #[error("Broker operation failed: {0}")]
    Operation(String),

    #[error("Queue message serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(error: serde_json::Error) -> Self {
        QueueError::Serialization(error.to_string())
    }
}
