use crate::db::errors::DbError;
use crate::scheduling::ScheduleError;
use crate::types::{LessonId, Operation, UserId};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// User lacks the role required for the operation
    #[error("Insufficient permissions to {action} {resource}")]
    InsufficientPermissions { action: Operation, resource: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Double-booking detected for a teacher or student
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        conflicts: Option<Vec<ScheduleConflict>>,
    },
}

/// One overlapping lesson found while checking a candidate time window.
///
/// Student conflicts are reported once per (student, lesson) pair so callers can say exactly who
/// is double-booked where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScheduleConflict {
    #[schema(value_type = String, format = "uuid")]
    pub lesson_id: LessonId,
    #[schema(value_type = String, format = "uuid")]
    pub teacher_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    /// Set when the conflict belongs to a student rather than the teacher
    #[schema(value_type = Option<String>, format = "uuid")]
    pub student_id: Option<UserId>,
    pub student_name: Option<String>,
}

impl ScheduleConflict {
    /// Human-readable reason, e.g. "Alice already has lesson 1a2b3c4d at 2025-03-03 10:00 UTC"
    pub fn describe(&self) -> String {
        let when = self.scheduled_at.format("%Y-%m-%d %H:%M UTC");
        let lesson = crate::types::abbrev_uuid(&self.lesson_id);
        match (&self.student_id, &self.student_name) {
            (Some(_), Some(name)) => format!("{name} already has lesson {lesson} at {when}"),
            (Some(id), None) => format!("Student {} already has lesson {lesson} at {when}", crate::types::abbrev_uuid(id)),
            (None, _) => format!("Teacher already has lesson {lesson} at {when}"),
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::ProtectedEntity { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Conflict { .. } => StatusCode::CONFLICT,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { action, resource } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { table, .. } => match table.as_deref() {
                    Some("users") => "A user with this email or username already exists".to_string(),
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::ProtectedEntity {
                    operation,
                    entity_type,
                    reason,
                    ..
                } => {
                    format!("Cannot {operation:?} {entity_type}: {reason}")
                }
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
            Error::Conflict { message, .. } => message.clone(),
        }
    }
}

impl From<ScheduleError> for Error {
    fn from(err: ScheduleError) -> Self {
        Error::BadRequest { message: err.to_string() }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            // Conflicts carry the overlapping lessons so the caller can show who clashes where
            Error::Conflict { message, conflicts } => {
                use serde_json::json;
                let body = if let Some(conflicts) = conflicts {
                    json!({
                        "message": message,
                        "conflicts": conflicts,
                    })
                } else {
                    json!({ "message": message })
                };

                (status, axum::response::Json(body)).into_response()
            }
            _ => {
                let user_message = self.user_message();
                (status, user_message).into_response()
            }
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[test]
    fn conflict_maps_to_409() {
        let err = Error::Conflict {
            message: "Schedule conflict".to_string(),
            conflicts: None,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn schedule_errors_become_bad_requests() {
        let err: Error = ScheduleError::EmptyWeekdays.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn describe_names_the_student() {
        let conflict = ScheduleConflict {
            lesson_id: Uuid::parse_str("1a2b3c4d-0000-0000-0000-000000000000").unwrap(),
            teacher_id: Uuid::new_v4(),
            scheduled_at: Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap(),
            duration_minutes: 60,
            student_id: Some(Uuid::new_v4()),
            student_name: Some("Alice".to_string()),
        };
        assert_eq!(conflict.describe(), "Alice already has lesson 1a2b3c4d at 2025-03-03 10:00 UTC");
    }
}
