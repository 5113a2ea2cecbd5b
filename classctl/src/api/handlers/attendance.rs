//! HTTP handlers for attendance marking. Every mark is settled against the ledger in the same
//! transaction that records it.

use crate::{
    AppState,
    api::models::{
        attendance::{AttendanceResponse, AttendanceUpdate, BulkAttendanceUpdate},
        users::CurrentUser,
    },
    auth::permissions,
    db::handlers::{Lessons, Repository},
    errors::{Error, Result},
    scheduling::settlement::AttendanceSettlement,
    types::{LessonId, Operation, UserId},
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use sqlx::PgConnection;

/// Load the lesson and check the caller runs it (or is staff)
async fn authorize(conn: &mut PgConnection, lesson_id: LessonId, current_user: &CurrentUser) -> Result<()> {
    let lesson = Lessons::new(conn).get_by_id(lesson_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Lesson".to_string(),
        id: lesson_id.to_string(),
    })?;
    permissions::require_manage_lesson(current_user, &lesson, Operation::Update)
}

/// Mark one student's attendance
#[utoipa::path(
    put,
    path = "/lessons/{lesson_id}/attendance/{student_id}",
    tag = "attendance",
    summary = "Set attendance for one student",
    description = "Present and unexcused absences are charged once; moving to pending or an excused absence refunds an outstanding charge. A student who cannot cover the price is marked but not charged and gets an insufficient-funds notice.",
    params(
        ("lesson_id" = uuid::Uuid, Path, description = "Lesson ID"),
        ("student_id" = uuid::Uuid, Path, description = "Student ID"),
    ),
    request_body = AttendanceUpdate,
    responses(
        (status = 200, description = "Settlement outcome", body = AttendanceResponse),
        (status = 400, description = "Lesson is cancelled"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not allowed to mark this lesson"),
        (status = 404, description = "Lesson or participant not found"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_attendance(
    State(state): State<AppState>,
    Path((lesson_id, student_id)): Path<(LessonId, UserId)>,
    current_user: CurrentUser,
    Json(data): Json<AttendanceUpdate>,
) -> Result<Json<AttendanceResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    authorize(&mut tx, lesson_id, &current_user).await?;

    let policy = state.config.scheduling.settlement_policy();
    let settlement = AttendanceSettlement::new(&mut tx, policy, current_user.id)
        .set_attendance(lesson_id, student_id, data.attendance_status)
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(AttendanceResponse::new(lesson_id, settlement)))
}

/// Mark several students at once
#[utoipa::path(
    put,
    path = "/lessons/{lesson_id}/attendance",
    tag = "attendance",
    summary = "Set attendance for several students",
    description = "All marks are settled in one transaction; if any mark fails nothing is applied.",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    request_body = BulkAttendanceUpdate,
    responses(
        (status = 200, description = "Settlement outcome per student", body = AttendanceResponse),
        (status = 400, description = "No marks given or lesson is cancelled"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not allowed to mark this lesson"),
        (status = 404, description = "Lesson or participant not found"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_attendance_bulk(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    current_user: CurrentUser,
    Json(data): Json<BulkAttendanceUpdate>,
) -> Result<Json<AttendanceResponse>> {
    if data.marks.is_empty() {
        return Err(Error::BadRequest {
            message: "At least one attendance mark is required".to_string(),
        });
    }
    let marks: Vec<(UserId, _)> = data.marks.iter().map(|m| (m.student_id, m.attendance_status)).collect();

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    authorize(&mut tx, lesson_id, &current_user).await?;

    let policy = state.config.scheduling.settlement_policy();
    let settlement = AttendanceSettlement::new(&mut tx, policy, current_user.id)
        .set_attendance_bulk(lesson_id, &marks)
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(AttendanceResponse::new(lesson_id, settlement)))
}
