//! Pagination-related DTOs for API requests.

use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

fn default_limit() -> i64 {
    10
}

/// Query parameters for paginated job listings.
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct PaginationParams {
    /// Maximum number of items to return
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    #[param(minimum = 1, maximum = 100, example = 10)]
    pub limit: i64,

    /// Number of items to skip
    #[serde(default)]
    #[validate(range(min = 0, message = "Offset must be zero or positive"))]
    #[param(minimum = 0, example = 0)]
    pub offset: i64,
}

/// Query parameters for execution history.
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct HistoryParams {
    /// Maximum number of executions to return, most recent first
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "Limit must be between 1 and 1000"))]
    #[param(minimum = 1, maximum = 1000, example = 10)]
    pub limit: i64,
}
