//! Error response DTOs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

/// Standard error response format with a stable machine code, a human
/// message, and optional structured details.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "JOB_NOT_FOUND")]
    pub code: String,
    #[schema(example = "Job not found")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Not-found response with an entity-specific code, e.g. entity
    /// "JobSchedule" becomes `JOB_SCHEDULE_NOT_FOUND`.
    pub fn not_found_error(entity: &str, field: &str, value: &str) -> Self {
        Self {
            code: format!("{}_NOT_FOUND", screaming_snake(entity)),
            message: format!("{} not found", entity),
            details: Some(json!({
                "entity": entity,
                "field": field,
                "value": value
            })),
        }
    }

    pub fn validation_error(field: &str, reason: &str) -> Self {
        Self {
            code: "INVALID_REQUEST".to_string(),
            message: format!("Validation failed for {}: {}", field, reason),
            details: Some(json!({
                "field": field,
                "reason": reason
            })),
        }
    }
}

/// "JobSchedule" -> "JOB_SCHEDULE"
fn screaming_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_uppercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_new() {
        let error = ErrorResponse::new("INVALID_SCHEDULE", "Invalid schedule format");
        assert_eq!(error.code, "INVALID_SCHEDULE");
        assert_eq!(error.message, "Invalid schedule format");
        assert!(error.details.is_none());
    }

    #[test]
    fn test_job_not_found_code() {
        let error = ErrorResponse::not_found_error("Job", "id", "42");
        assert_eq!(error.code, "JOB_NOT_FOUND");
        assert_eq!(error.details.unwrap()["value"], "42");
    }

    #[test]
    fn test_job_schedule_not_found_code() {
        let error = ErrorResponse::not_found_error("JobSchedule", "job_id", "42");
        assert_eq!(error.code, "JOB_SCHEDULE_NOT_FOUND");
        assert_eq!(error.message, "JobSchedule not found");
    }

    #[test]
    fn test_validation_error_uses_invalid_request_code() {
        let error = ErrorResponse::validation_error("api", "must be a valid URL");
        assert_eq!(error.code, "INVALID_REQUEST");
        let details = error.details.unwrap();
        assert_eq!(details["field"], "api");
        assert_eq!(details["reason"], "must be a valid URL");
    }

    #[test]
    fn test_serialization_skips_missing_details() {
        let error = ErrorResponse::new("INTERNAL_SERVER_ERROR", "Internal server error");
        let json_str = serde_json::to_string(&error).unwrap();
        assert!(!json_str.contains("details"));
    }
}
