//! API request/response models for lessons and recurring batches.

use super::pagination::Pagination;
use crate::db::models::lessons::{AttendanceStatus, LessonDBResponse, LessonStatus, LessonStudentDBResponse, LessonUpdateDBRequest};
use crate::errors::ScheduleConflict;
use crate::scheduling::{
    batch::{BatchConflict, BatchOutcome},
    lifecycle::CancellationReason,
};
use crate::types::{GroupId, LessonId, LessonTypeId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn default_duration() -> i32 {
    60
}

// Request models

/// Book one lesson. Participants are the group's members plus `student_ids`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonCreate {
    #[schema(value_type = String, format = "uuid")]
    pub teacher_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub lesson_type_id: LessonTypeId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub student_ids: Vec<UserId>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    pub meeting_url: Option<String>,
}

/// Partial update of a scheduled lesson. Omitted fields are left unchanged; `student_ids`
/// replaces the whole participant list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LessonUpdate {
    #[schema(value_type = Option<String>, format = "uuid")]
    pub teacher_id: Option<UserId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    /// An empty string removes the link
    pub meeting_url: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub student_ids: Option<Vec<UserId>>,
}

impl From<LessonUpdate> for LessonUpdateDBRequest {
    fn from(update: LessonUpdate) -> Self {
        Self {
            teacher_id: update.teacher_id,
            scheduled_at: update.scheduled_at,
            duration_minutes: update.duration_minutes,
            meeting_url: update.meeting_url,
            student_ids: update.student_ids,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LessonCancel {
    #[serde(default)]
    pub reason: CancellationReason,
}

/// A weekly pattern to book, e.g. Mondays and Wednesdays at 10:00 for four weeks.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecurringLessonCreate {
    #[schema(value_type = String, format = "uuid")]
    pub teacher_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub lesson_type_id: LessonTypeId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub student_ids: Vec<UserId>,
    /// First day of the first week
    pub start_date: NaiveDate,
    /// Full or three-letter English weekday names, case-insensitive
    pub weekdays: Vec<String>,
    pub week_count: i32,
    /// Local start time, `HH:MM`
    pub time_of_day: String,
    /// Offset of `time_of_day` from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    pub meeting_url: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListLessonsQuery {
    #[param(value_type = Option<String>, format = "uuid")]
    pub teacher_id: Option<UserId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub student_id: Option<UserId>,
    #[param(value_type = Option<String>)]
    pub status: Option<LessonStatus>,
    /// Only lessons starting at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only lessons starting before this instant
    pub to: Option<DateTime<Utc>>,

    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

// Response models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonStudentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub student_id: UserId,
    pub attendance_status: AttendanceStatus,
    /// True while a debit for this student is outstanding
    pub charged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: LessonId,
    #[schema(value_type = String, format = "uuid")]
    pub teacher_id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub group_id: Option<GroupId>,
    #[schema(value_type = String, format = "uuid")]
    pub lesson_type_id: LessonTypeId,
    pub scheduled_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: LessonStatus,
    pub meeting_url: Option<String>,
    pub cancellation_reason: Option<String>,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub students: Vec<LessonStudentResponse>,
}

impl From<LessonStudentDBResponse> for LessonStudentResponse {
    fn from(db: LessonStudentDBResponse) -> Self {
        Self {
            student_id: db.student_id,
            attendance_status: db.attendance_status,
            charged: db.charged,
        }
    }
}

impl From<LessonDBResponse> for LessonResponse {
    fn from(db: LessonDBResponse) -> Self {
        Self {
            id: db.id,
            teacher_id: db.teacher_id,
            group_id: db.group_id,
            lesson_type_id: db.lesson_type_id,
            scheduled_at: db.scheduled_at,
            ends_at: db.ends_at(),
            duration_minutes: db.duration_minutes,
            status: db.status,
            meeting_url: db.meeting_url,
            cancellation_reason: db.cancellation_reason,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
            students: db.students.into_iter().map(LessonStudentResponse::from).collect(),
        }
    }
}

/// Result of a recurring request: what got booked and which dates were skipped
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResponse {
    pub created: Vec<LessonResponse>,
    pub conflicts: Vec<BatchConflict>,
}

impl From<BatchOutcome> for BatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            created: outcome.created.into_iter().map(LessonResponse::from).collect(),
            conflicts: outcome.conflicts,
        }
    }
}

/// Body of a 409 response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConflictResponse {
    pub message: String,
    pub conflicts: Vec<ScheduleConflict>,
}
