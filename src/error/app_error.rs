use thiserror::Error;

use crate::error::DatabaseErrorConverter;
use crate::queue::QueueError;
use crate::schedule::ScheduleError;

/// Application-wide error type that represents all possible errors in the
/// system.
///
/// Every user-visible variant maps to a stable machine code and an HTTP
/// status in the API error handler; loop-internal errors are logged with
/// the offending job/queue id and retried on the next tick.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Malformed or incomplete request body
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Multiple field validation failures from request DTO validation
    #[error("Validation failed for {} field(s)", errors.len())]
    ValidationErrors { errors: Vec<ValidationFieldError> },

    /// Job type is not one of the supported delivery semantics
    #[error("Invalid job type '{value}'. Must be AT_LEAST_ONCE or AT_MOST_ONCE")]
    InvalidJobType { value: String },

    /// CRON expression failed to parse or admits no future firing
    #[error("Invalid schedule: {reason}")]
    InvalidSchedule { reason: String },

    /// Database operation error with operation context
    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Broker (work queue) operation error
    #[error("Queue operation failed")]
    Queue {
        #[source]
        source: QueueError,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Connection pool error
    #[error("Connection pool error")]
    ConnectionPool {
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

/// A single field validation failure.
#[derive(Debug, Clone)]
pub struct ValidationFieldError {
    pub field: String,
    pub message: String,
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(error: diesel::result::Error) -> Self {
        DatabaseErrorConverter::convert_diesel_error(error, "database operation")
    }
}

impl From<QueueError> for AppError {
    fn from(error: QueueError) -> Self {
        AppError::Queue { source: error }
    }
}

impl From<ScheduleError> for AppError {
    fn from(error: ScheduleError) -> Self {
        AppError::InvalidSchedule {
            reason: error.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let errors = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| ValidationFieldError {
                    field: field.to_string(),
                    message: failure
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Validation failed for {}", field)),
                })
            })
            .collect();

        AppError::ValidationErrors { errors }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_includes_identifiers() {
        let error = AppError::NotFound {
            entity: "Job".to_string(),
            field: "id".to_string(),
            value: "42".to_string(),
        };
        assert_eq!(error.to_string(), "Resource not found: Job with id=42");
    }

    #[test]
    fn invalid_job_type_names_accepted_values() {
        let error = AppError::InvalidJobType {
            value: "EXACTLY_ONCE".to_string(),
        };
        assert!(error.to_string().contains("AT_LEAST_ONCE"));
        assert!(error.to_string().contains("AT_MOST_ONCE"));
    }

    #[test]
    fn validator_errors_convert_to_field_list() {
        use validator::Validate;

        #[derive(Validate)]
        struct Probe {
            #[validate(url(message = "Target URL must be a valid URL"))]
            api: String,
        }

        let probe = Probe {
            api: "not a url".to_string(),
        };
        let error: AppError = probe.validate().unwrap_err().into();
        match error {
            AppError::ValidationErrors { errors } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "api");
                assert!(errors[0].message.contains("valid URL"));
            }
            other => panic!("Expected ValidationErrors, got {:?}", other),
        }
    }
}
