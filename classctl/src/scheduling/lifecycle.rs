//! Lesson status machine.
//!
//! ```text
//!              ┌──► completed
//!  scheduled ──┤
//!              └──► cancelled
//! ```
//!
//! Both targets are terminal. Completion happens lazily when a lesson is read after it has
//! ended, or eagerly when settlement leaves no participant `pending`. Cancellation is explicit
//! and leaves posted ledger rows alone.

use super::{ScheduleError, notify::Notifier};
use crate::db::{
    handlers::Lessons,
    models::lessons::{AttendanceStatus, LessonDBResponse, LessonStatus},
};
use crate::errors::{Error, Result};
use crate::types::{LessonId, abbrev_uuid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::instrument;
use utoipa::ToSchema;

impl LessonStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LessonStatus::Scheduled)
    }

    pub fn can_transition_to(self, to: LessonStatus) -> bool {
        matches!(
            (self, to),
            (LessonStatus::Scheduled, LessonStatus::Completed) | (LessonStatus::Scheduled, LessonStatus::Cancelled)
        )
    }

    pub fn transition(self, to: LessonStatus) -> std::result::Result<LessonStatus, ScheduleError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(ScheduleError::InvalidTransition { from: self, to })
        }
    }
}

impl AttendanceStatus {
    /// Present and unexcused absences are billed; excused absences and pending are not
    pub fn is_chargeable(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::AbsentUnexcused)
    }
}

/// Why a lesson was cancelled, stored in `lessons.cancellation_reason`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// The teacher ended the lesson early
    TeacherEnded,
    #[default]
    Cancelled,
}

impl CancellationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CancellationReason::TeacherEnded => "teacher_ended",
            CancellationReason::Cancelled => "cancelled",
        }
    }
}

/// A scheduled lesson is due once `now >= scheduled_at + duration`
pub fn is_due_for_completion(lesson: &LessonDBResponse, now: DateTime<Utc>) -> bool {
    lesson.status == LessonStatus::Scheduled && now >= lesson.ends_at()
}

/// Schedule, teacher and participants of terminal lessons are frozen
pub fn ensure_editable(lesson: &LessonDBResponse) -> std::result::Result<(), ScheduleError> {
    if lesson.status.is_terminal() {
        return Err(ScheduleError::LessonClosed(lesson.status));
    }
    Ok(())
}

/// Lazily complete every due lesson among `lessons`, updating them in place. Lessons that are
/// already terminal are left untouched, so re-reading is a no-op.
#[instrument(skip(conn, lessons), fields(count = lessons.len()), err)]
pub async fn complete_overdue(conn: &mut PgConnection, lessons: &mut [LessonDBResponse], now: DateTime<Utc>) -> Result<usize> {
    let due: Vec<LessonId> = lessons.iter().filter(|l| is_due_for_completion(l, now)).map(|l| l.id).collect();
    if due.is_empty() {
        return Ok(0);
    }

    let completed = Lessons::new(conn).complete_ended(&due, now).await?;
    for lesson in lessons.iter_mut().filter(|l| completed.contains(&l.id)) {
        lesson.status = LessonStatus::Completed;
    }

    if !completed.is_empty() {
        tracing::info!(count = completed.len(), "Auto-completed ended lessons");
    }
    Ok(completed.len())
}

/// Complete the lesson if no participant is still `pending`. Returns whether it moved.
#[instrument(skip(conn), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
pub async fn complete_if_settled(conn: &mut PgConnection, lesson_id: LessonId) -> Result<bool> {
    let mut lessons = Lessons::new(conn);
    if lessons.pending_count(lesson_id).await? > 0 {
        return Ok(false);
    }
    let moved = lessons.mark_completed(lesson_id).await?;
    if moved {
        tracing::info!(lesson_id = %abbrev_uuid(&lesson_id), "Lesson completed after final attendance mark");
    }
    Ok(moved)
}

/// Cancel a scheduled lesson and tell each participant. Charges already posted stay posted.
#[instrument(skip(conn), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
pub async fn cancel(conn: &mut PgConnection, lesson_id: LessonId, reason: CancellationReason) -> Result<LessonDBResponse> {
    let lesson = Lessons::new(&mut *conn).lock(lesson_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Lesson".to_string(),
        id: lesson_id.to_string(),
    })?;
    lesson.status.transition(LessonStatus::Cancelled)?;

    Lessons::new(&mut *conn).mark_cancelled(lesson_id, reason.as_str()).await?;

    let mut notifier = Notifier::new(&mut *conn);
    for student_id in lesson.student_ids() {
        notifier.lesson_cancelled(student_id, lesson_id, lesson.scheduled_at, reason.as_str()).await?;
    }

    tracing::info!(
        lesson_id = %abbrev_uuid(&lesson_id),
        students = lesson.students.len(),
        reason = reason.as_str(),
        "Lesson cancelled"
    );

    Ok(LessonDBResponse {
        status: LessonStatus::Cancelled,
        cancellation_reason: Some(reason.as_str().to_string()),
        ..lesson
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Notifications, Repository};
    use crate::db::models::{lessons::LessonCreateDBRequest, notifications::NotificationKind, users::Role};
    use crate::test_utils::{create_test_lesson_type, create_test_user};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[test]
    fn transition_table() {
        use LessonStatus::*;
        assert_eq!(Scheduled.transition(Completed), Ok(Completed));
        assert_eq!(Scheduled.transition(Cancelled), Ok(Cancelled));
        for (from, to) in [(Completed, Scheduled), (Cancelled, Scheduled), (Completed, Cancelled), (Cancelled, Completed), (Scheduled, Scheduled)] {
            assert_eq!(from.transition(to), Err(ScheduleError::InvalidTransition { from, to }));
        }
        assert!(!Scheduled.is_terminal());
        assert!(Completed.is_terminal() && Cancelled.is_terminal());
    }

    #[test]
    fn chargeable_statuses() {
        assert!(AttendanceStatus::Present.is_chargeable());
        assert!(AttendanceStatus::AbsentUnexcused.is_chargeable());
        assert!(!AttendanceStatus::AbsentExcused.is_chargeable());
        assert!(!AttendanceStatus::Pending.is_chargeable());
    }

    async fn seed(pool: &PgPool, scheduled_at: DateTime<Utc>) -> LessonDBResponse {
        let teacher = create_test_user(pool, Role::Teacher).await;
        let alice = create_test_user(pool, Role::Student).await;
        let bob = create_test_user(pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(pool, Decimal::new(1000, 0)).await;
        let mut conn = pool.acquire().await.unwrap();
        Lessons::new(&mut conn)
            .create(&LessonCreateDBRequest {
                teacher_id: teacher.id,
                group_id: None,
                lesson_type_id: lesson_type.id,
                scheduled_at,
                duration_minutes: 45,
                meeting_url: None,
                student_ids: vec![alice.id, bob.id],
                created_by: teacher.id,
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_auto_completion_is_idempotent(pool: PgPool) {
        let now = Utc::now();
        let ended = seed(&pool, now - Duration::minutes(45)).await;
        let running = seed(&pool, now - Duration::minutes(10)).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut lessons = vec![ended.clone(), running.clone()];

        assert_eq!(complete_overdue(&mut conn, &mut lessons, now).await.unwrap(), 1);
        assert_eq!(lessons[0].status, LessonStatus::Completed);
        assert_eq!(lessons[1].status, LessonStatus::Scheduled);

        // Re-reading: the stored status is already completed and nothing changes
        let mut reread = vec![Lessons::new(&mut conn).get_by_id(ended.id).await.unwrap().unwrap()];
        assert_eq!(reread[0].status, LessonStatus::Completed);
        assert_eq!(complete_overdue(&mut conn, &mut reread, now).await.unwrap(), 0);
        assert_eq!(reread[0].updated_at, Lessons::new(&mut conn).get_by_id(ended.id).await.unwrap().unwrap().updated_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_completes_when_nobody_is_pending(pool: PgPool) {
        let lesson = seed(&pool, Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap()).await;
        let mut conn = pool.acquire().await.unwrap();

        Lessons::new(&mut conn)
            .record_attendance(lesson.id, lesson.students[0].student_id, AttendanceStatus::AbsentExcused, false)
            .await
            .unwrap();
        assert!(!complete_if_settled(&mut conn, lesson.id).await.unwrap());

        Lessons::new(&mut conn)
            .record_attendance(lesson.id, lesson.students[1].student_id, AttendanceStatus::AbsentExcused, false)
            .await
            .unwrap();
        assert!(complete_if_settled(&mut conn, lesson.id).await.unwrap());
        assert!(!complete_if_settled(&mut conn, lesson.id).await.unwrap(), "second call is a no-op");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_notifies_each_student_once(pool: PgPool) {
        let lesson = seed(&pool, Utc.with_ymd_and_hms(2030, 1, 7, 10, 0, 0).unwrap()).await;
        let mut tx = pool.begin().await.unwrap();

        let cancelled = cancel(&mut tx, lesson.id, CancellationReason::TeacherEnded).await.unwrap();
        assert_eq!(cancelled.status, LessonStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("teacher_ended"));

        let notes = Notifications::new(&mut tx).list_for_lesson(lesson.id).await.unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.kind == NotificationKind::LessonCancelled));

        // Terminal lessons cannot be cancelled again
        let err = cancel(&mut tx, lesson.id, CancellationReason::Cancelled).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        tx.commit().await.unwrap();
    }
}
