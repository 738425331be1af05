use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::error::AppError;

/// Utility for converting Diesel errors to structured AppError variants.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to an appropriate AppError variant.
    ///
    /// `NotFound` becomes the generic not-found variant (repositories
    /// usually intercept it first with entity-specific context);
    /// constraint violations become validation errors so they surface as
    /// 400s instead of opaque 500s.
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                AppError::Validation {
                    field: info
                        .column_name()
                        .unwrap_or_else(|| info.constraint_name().unwrap_or("unknown"))
                        .to_string(),
                    reason: format!("Unique constraint violation: {}", info.message()),
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                AppError::Validation {
                    field: info.column_name().unwrap_or("unknown").to_string(),
                    reason: format!("Invalid reference: {}", info.message()),
                }
            }
            DieselError::DatabaseError(_, info) => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::msg(info.message().to_string()),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }
}
