//! API request/response models for attendance marking.

use crate::db::models::lessons::AttendanceStatus;
use crate::scheduling::settlement::{LessonSettlement, SettlementOutcome, SettlementReport};
use crate::types::{LessonId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Request models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceUpdate {
    pub attendance_status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceMark {
    #[schema(value_type = String, format = "uuid")]
    pub student_id: UserId,
    pub attendance_status: AttendanceStatus,
}

/// Several marks for one lesson, settled in one transaction
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkAttendanceUpdate {
    pub marks: Vec<AttendanceMark>,
}

// Response models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettlementResponse {
    #[schema(value_type = String, format = "uuid")]
    pub student_id: UserId,
    pub attendance_status: AttendanceStatus,
    pub outcome: SettlementOutcome,
    pub charged: bool,
    /// Student balance after settlement; absent when nothing was posted
    #[schema(value_type = Option<String>)]
    pub student_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub lesson_id: LessonId,
    /// True when this update settled the last pending participant and closed the lesson
    pub lesson_completed: bool,
    pub results: Vec<SettlementResponse>,
}

impl From<SettlementReport> for SettlementResponse {
    fn from(report: SettlementReport) -> Self {
        Self {
            student_id: report.student_id,
            attendance_status: report.attendance_status,
            outcome: report.outcome,
            charged: report.charged,
            student_balance: report.student_balance,
        }
    }
}

impl AttendanceResponse {
    pub fn new(lesson_id: LessonId, settlement: LessonSettlement) -> Self {
        Self {
            lesson_id,
            lesson_completed: settlement.lesson_completed,
            results: settlement.reports.into_iter().map(SettlementResponse::from).collect(),
        }
    }
}
