//! Error handler for converting AppError to HTTP responses.
//!
//! Implements IntoResponse for AppError with the stable machine codes the
//! API contract promises, plus a catch-all layer that normalizes framework
//! rejections into the same envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::api::dto::ErrorResponse;
use crate::error::AppError;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::NotFound {
                entity,
                field,
                value,
            } => (
                StatusCode::NOT_FOUND,
                ErrorResponse::not_found_error(entity, field, value),
            ),
            AppError::InvalidRequest { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("INVALID_REQUEST", message),
            ),
            AppError::Validation { field, reason } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::validation_error(field, reason),
            ),
            AppError::ValidationErrors { errors } => {
                let details = json!({
                    "errors": errors.iter().map(|e| json!({
                        "field": e.field,
                        "message": e.message
                    })).collect::<Vec<_>>()
                });

                let message = if errors.len() == 1 {
                    format!(
                        "Validation failed for {}: {}",
                        errors[0].field, errors[0].message
                    )
                } else {
                    format!("Validation failed for {} field(s)", errors.len())
                };

                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("INVALID_REQUEST", &message).with_details(details),
                )
            }
            AppError::InvalidJobType { value } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(
                    "INVALID_JOB_TYPE",
                    "Invalid job type. Must be AT_LEAST_ONCE or AT_MOST_ONCE",
                )
                .with_details(json!({ "value": value })),
            ),
            AppError::InvalidSchedule { reason } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("INVALID_SCHEDULE", "Invalid schedule format")
                    .with_details(json!({ "reason": reason })),
            ),
            AppError::Database { operation, source } => {
                tracing::error!(
                    error = ?source,
                    operation = %operation,
                    "Database error occurred"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("DATABASE_ERROR", "Database operation failed")
                        .with_details(json!({ "operation": operation })),
                )
            }
            AppError::Queue { source } => {
                tracing::error!(error = ?source, "Queue error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("QUEUE_ERROR", "Queue operation failed"),
                )
            }
            AppError::Configuration { key, source } => {
                tracing::error!(error = ?source, key = %key, "Configuration error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("CONFIG_ERROR", "Configuration error")
                        .with_details(json!({ "key": key })),
                )
            }
            AppError::ConnectionPool { source } => {
                tracing::error!(error = ?source, "Connection pool error occurred");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new("SERVICE_UNAVAILABLE", "Database connection unavailable"),
                )
            }
            AppError::Internal { source } => {
                tracing::error!(error = ?source, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_SERVER_ERROR", "Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Catch-all layer converting plain-text framework errors (404 routing
/// misses, method mismatches, body rejections that bypassed extractors)
/// into the standard ErrorResponse envelope.
pub async fn global_error_handler(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let response = next.run(request).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    // Handlers already answer in the standard JSON envelope; leave those.
    let is_json = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false);
    if is_json {
        return response;
    }

    let (_parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let original_message = String::from_utf8_lossy(&body_bytes).trim().to_string();

    let error_response = match status {
        StatusCode::BAD_REQUEST => {
            let message = if original_message.is_empty() {
                "Invalid request".to_string()
            } else {
                original_message
            };
            ErrorResponse::new("INVALID_REQUEST", &message)
        }
        StatusCode::NOT_FOUND => ErrorResponse::new("NOT_FOUND", "The requested resource was not found"),
        StatusCode::METHOD_NOT_ALLOWED => {
            ErrorResponse::new("METHOD_NOT_ALLOWED", "HTTP method not allowed for this endpoint")
        }
        StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            ErrorResponse::new("UNSUPPORTED_MEDIA_TYPE", "Unsupported media type")
        }
        StatusCode::PAYLOAD_TOO_LARGE => {
            ErrorResponse::new("PAYLOAD_TOO_LARGE", "Request payload too large")
        }
        StatusCode::INTERNAL_SERVER_ERROR => {
            tracing::error!(
                status = %status,
                original_message = %original_message,
                "Internal server error occurred"
            );
            ErrorResponse::new("INTERNAL_SERVER_ERROR", "Internal server error")
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            ErrorResponse::new("SERVICE_UNAVAILABLE", "Service temporarily unavailable")
        }
        _ => {
            let message = if original_message.is_empty() {
                "An unknown error occurred".to_string()
            } else {
                original_message
            };
            ErrorResponse::new("UNKNOWN_ERROR", &message)
        }
    };

    (status, Json(error_response)).into_response()
}
