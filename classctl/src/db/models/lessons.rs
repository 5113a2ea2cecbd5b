//! Database models for lessons and their participants.
//!
//! The status enums live here because they are storage types; the rules for moving between
//! them live in [`crate::scheduling::lifecycle`].

use crate::types::{GroupId, LessonId, LessonTypeId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lesson status, stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// Per-student attendance outcome, stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Pending,
    Present,
    AbsentExcused,
    AbsentUnexcused,
}

/// Database request for creating a lesson with its participants
#[derive(Debug, Clone)]
pub struct LessonCreateDBRequest {
    pub teacher_id: UserId,
    pub group_id: Option<GroupId>,
    pub lesson_type_id: LessonTypeId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub meeting_url: Option<String>,
    pub student_ids: Vec<UserId>,
    pub created_by: UserId,
}

/// Database request for updating a scheduled lesson. `None` leaves a field unchanged; an empty
/// `meeting_url` clears it.
#[derive(Debug, Clone, Default)]
pub struct LessonUpdateDBRequest {
    pub teacher_id: Option<UserId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub meeting_url: Option<String>,
    pub student_ids: Option<Vec<UserId>>,
}

/// One participant row of a lesson
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LessonStudentDBResponse {
    pub lesson_id: LessonId,
    pub student_id: UserId,
    pub attendance_status: AttendanceStatus,
    /// True iff a debit for this pair is currently outstanding
    pub charged: bool,
    pub updated_at: DateTime<Utc>,
}

/// Database response for a lesson
#[derive(Debug, Clone)]
pub struct LessonDBResponse {
    pub id: LessonId,
    pub teacher_id: UserId,
    pub group_id: Option<GroupId>,
    pub lesson_type_id: LessonTypeId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: LessonStatus,
    pub meeting_url: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub students: Vec<LessonStudentDBResponse>,
}

impl LessonDBResponse {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn student_ids(&self) -> Vec<UserId> {
        self.students.iter().map(|s| s.student_id).collect()
    }
}

/// One occupied slot returned by the conflict queries. `student_id` is set when the slot was
/// found through a participant rather than the teacher.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LessonSlotDBResponse {
    pub lesson_id: LessonId,
    pub teacher_id: UserId,
    pub status: LessonStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub student_id: Option<UserId>,
    pub student_name: Option<String>,
}

/// A participant row locked for settlement, joined with what billing needs from its lesson
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceTargetDBResponse {
    pub lesson_id: LessonId,
    pub student_id: UserId,
    pub attendance_status: AttendanceStatus,
    pub charged: bool,
    pub teacher_id: UserId,
    pub lesson_type_id: LessonTypeId,
    pub lesson_status: LessonStatus,
    pub scheduled_at: DateTime<Utc>,
}
