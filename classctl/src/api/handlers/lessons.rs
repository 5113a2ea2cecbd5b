//! HTTP handlers for lessons: booking, schedule views, edits, cancellation and recurring batches.

use crate::{
    AppState,
    api::models::{
        lessons::{BatchResponse, ConflictResponse, LessonCancel, LessonCreate, LessonResponse, LessonUpdate, ListLessonsQuery, RecurringLessonCreate},
        pagination::PaginatedResponse,
        users::{CurrentUser, Role},
    },
    auth::permissions,
    db::handlers::{Lessons, Repository, lessons::LessonFilter},
    errors::{Error, Result},
    scheduling::{
        batch::{BatchLimits, BatchScheduler, RecurringLessonRequest},
        lessons::{NewLesson, create_lesson as book_lesson, update_lesson as edit_lesson},
        lifecycle,
    },
    types::{LessonId, Operation},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;

fn lesson_not_found(id: LessonId) -> Error {
    Error::NotFound {
        resource: "Lesson".to_string(),
        id: id.to_string(),
    }
}

/// Book a single lesson
#[utoipa::path(
    post,
    path = "/lessons",
    tag = "lessons",
    summary = "Create a lesson",
    description = "Book one lesson for a teacher and a set of students (group members plus explicit ids). Rejected with 409 if the teacher or any student is already booked in an overlapping window.",
    request_body = LessonCreate,
    responses(
        (status = 201, description = "Lesson created", body = LessonResponse),
        (status = 400, description = "Invalid duration, empty student set or unknown participant"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teachers may only book their own lessons"),
        (status = 409, description = "Schedule conflict", body = ConflictResponse),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_lesson(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(data): Json<LessonCreate>,
) -> Result<(StatusCode, Json<LessonResponse>)> {
    permissions::require_can_schedule_for(&current_user, data.teacher_id)?;

    let new = NewLesson {
        teacher_id: data.teacher_id,
        lesson_type_id: data.lesson_type_id,
        group_id: data.group_id,
        student_ids: data.student_ids,
        scheduled_at: data.scheduled_at,
        duration_minutes: data.duration_minutes,
        meeting_url: data.meeting_url,
        created_by: current_user.id,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let lesson = book_lesson(&mut tx, &new).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(LessonResponse::from(lesson))))
}

/// Get one lesson
#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Get a lesson",
    description = "A scheduled lesson that has already ended is completed before it is returned.",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 200, description = "Lesson details", body = LessonResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lesson not found"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    current_user: CurrentUser,
) -> Result<Json<LessonResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut lesson = Lessons::new(&mut tx)
        .get_by_id(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;

    // 404 rather than 403 so lesson ids don't leak
    if !permissions::can_read_lesson(&current_user, &lesson) {
        return Err(lesson_not_found(lesson_id));
    }

    lifecycle::complete_overdue(&mut tx, std::slice::from_mut(&mut lesson), Utc::now()).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(LessonResponse::from(lesson)))
}

/// List lessons
#[utoipa::path(
    get,
    path = "/lessons",
    tag = "lessons",
    summary = "List lessons",
    description = "Schedule view ordered by start time. Students only see lessons they attend and teachers only the lessons they run; managers see everything. Ended lessons are completed as they are read.",
    params(ListLessonsQuery),
    responses(
        (status = 200, description = "Paginated lessons", body = PaginatedResponse<LessonResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Cannot view another user's schedule"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_lessons(
    State(state): State<AppState>,
    Query(query): Query<ListLessonsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<LessonResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut filter = LessonFilter {
        teacher_id: query.teacher_id,
        student_id: query.student_id,
        status: query.status,
        from: query.from,
        to: query.to,
        skip,
        limit,
    };

    // Non-staff are pinned to their own schedule
    match current_user.role {
        Role::Admin | Role::Manager => {}
        Role::Teacher => {
            permissions::require_self_or_staff(&current_user, filter.teacher_id.unwrap_or(current_user.id), Operation::Read, "lessons")?;
            filter.teacher_id = Some(current_user.id);
        }
        Role::Student => {
            permissions::require_self_or_staff(&current_user, filter.student_id.unwrap_or(current_user.id), Operation::Read, "lessons")?;
            filter.student_id = Some(current_user.id);
        }
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut lessons = Lessons::new(&mut tx).list(&filter).await?;
    let total_count = Lessons::new(&mut tx).count(&filter).await?;

    lifecycle::complete_overdue(&mut tx, &mut lessons, Utc::now()).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    // Lessons completed just now no longer match a `scheduled` filter
    if let Some(status) = filter.status {
        lessons.retain(|lesson| lesson.status == status);
    }

    Ok(Json(PaginatedResponse::new(
        lessons.into_iter().map(LessonResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Edit a scheduled lesson
#[utoipa::path(
    patch,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Update a lesson",
    description = "Reschedule, change teacher, meeting link or participants. Completed and cancelled lessons cannot be edited. Students with an outstanding charge cannot be removed.",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    request_body = LessonUpdate,
    responses(
        (status = 200, description = "Lesson updated", body = LessonResponse),
        (status = 400, description = "Lesson is closed or the change is invalid"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not allowed to edit this lesson"),
        (status = 404, description = "Lesson not found"),
        (status = 409, description = "Schedule conflict or charged student removed", body = ConflictResponse),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    current_user: CurrentUser,
    Json(data): Json<LessonUpdate>,
) -> Result<Json<LessonResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let lesson = Lessons::new(&mut tx)
        .get_by_id(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;
    permissions::require_manage_lesson(&current_user, &lesson, Operation::Update)?;
    if let Some(teacher_id) = data.teacher_id {
        permissions::require_can_schedule_for(&current_user, teacher_id)?;
    }

    let updated = edit_lesson(&mut tx, lesson_id, &data.into()).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(LessonResponse::from(updated)))
}

/// Delete a lesson
#[utoipa::path(
    delete,
    path = "/lessons/{lesson_id}",
    tag = "lessons",
    summary = "Delete a lesson",
    description = "Managers only. Ledger rows and notifications that reference the lesson are kept with the reference cleared.",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    responses(
        (status = 204, description = "Lesson deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Managers only"),
        (status = 404, description = "Lesson not found"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    permissions::require_staff(&current_user, Operation::Delete, "lessons")?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if !Lessons::new(&mut tx).delete(lesson_id).await? {
        return Err(lesson_not_found(lesson_id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Cancel a lesson
#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/cancel",
    tag = "lessons",
    summary = "Cancel a lesson",
    description = "Moves a scheduled lesson to cancelled and notifies its students. Charges already posted are not refunded.",
    params(("lesson_id" = uuid::Uuid, Path, description = "Lesson ID")),
    request_body = LessonCancel,
    responses(
        (status = 200, description = "Lesson cancelled", body = LessonResponse),
        (status = 400, description = "Lesson is already completed or cancelled"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not allowed to cancel this lesson"),
        (status = 404, description = "Lesson not found"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn cancel_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<LessonId>,
    current_user: CurrentUser,
    Json(data): Json<LessonCancel>,
) -> Result<Json<LessonResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let lesson = Lessons::new(&mut tx)
        .get_by_id(lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(lesson_id))?;
    permissions::require_manage_lesson(&current_user, &lesson, Operation::Update)?;

    let cancelled = lifecycle::cancel(&mut tx, lesson_id, data.reason).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(LessonResponse::from(cancelled)))
}

/// Book a weekly pattern
#[utoipa::path(
    post,
    path = "/lessons/batch",
    tag = "lessons",
    summary = "Create recurring lessons",
    description = "Expands weekdays x weeks into occurrences and books them in order. Occurrences that clash with an existing lesson are skipped and reported; the rest are booked.",
    request_body = RecurringLessonCreate,
    responses(
        (status = 200, description = "Booked lessons and skipped dates", body = BatchResponse),
        (status = 400, description = "Invalid pattern, duration or participants"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Teachers may only book their own lessons"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_recurring_lessons(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(data): Json<RecurringLessonCreate>,
) -> Result<Json<BatchResponse>> {
    permissions::require_can_schedule_for(&current_user, data.teacher_id)?;

    let request = RecurringLessonRequest {
        teacher_id: data.teacher_id,
        lesson_type_id: data.lesson_type_id,
        group_id: data.group_id,
        student_ids: data.student_ids,
        start_date: data.start_date,
        weekdays: data.weekdays,
        week_count: data.week_count,
        time_of_day: data.time_of_day,
        utc_offset_minutes: data.utc_offset_minutes,
        duration_minutes: data.duration_minutes,
        meeting_url: data.meeting_url,
        created_by: current_user.id,
    };

    let scheduler = BatchScheduler::new(&state.db, BatchLimits::from(&state.config.scheduling));
    let outcome = scheduler.create_recurring_lessons(&request).await?;

    Ok(Json(BatchResponse::from(outcome)))
}
