//! Database repository for lessons and their participants.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::lessons::{
        AttendanceStatus, AttendanceTargetDBResponse, LessonCreateDBRequest, LessonDBResponse, LessonSlotDBResponse, LessonStatus,
        LessonStudentDBResponse, LessonUpdateDBRequest,
    },
};
use crate::types::{GroupId, LessonId, LessonTypeId, Operation, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

const LESSON_COLUMNS: &str = "id, teacher_id, group_id, lesson_type_id, scheduled_at, duration_minutes, status, meeting_url, \
                              cancellation_reason, created_by, created_at, updated_at";

/// Filter for listing lessons. Time bounds apply to `scheduled_at` (`from` inclusive, `to`
/// exclusive).
#[derive(Debug, Clone, Default)]
pub struct LessonFilter {
    pub teacher_id: Option<UserId>,
    pub student_id: Option<UserId>,
    pub status: Option<LessonStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub skip: i64,
    pub limit: i64,
}

impl LessonFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

// Database entity model, without participants
#[derive(Debug, Clone, FromRow)]
struct Lesson {
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
}

impl From<(Lesson, Vec<LessonStudentDBResponse>)> for LessonDBResponse {
    fn from((lesson, students): (Lesson, Vec<LessonStudentDBResponse>)) -> Self {
        Self {
            id: lesson.id,
            teacher_id: lesson.teacher_id,
            group_id: lesson.group_id,
            lesson_type_id: lesson.lesson_type_id,
            scheduled_at: lesson.scheduled_at,
            duration_minutes: lesson.duration_minutes,
            status: lesson.status,
            meeting_url: lesson.meeting_url,
            cancellation_reason: lesson.cancellation_reason,
            created_by: lesson.created_by,
            created_at: lesson.created_at,
            updated_at: lesson.updated_at,
            students,
        }
    }
}

pub struct Lessons<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Lessons<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn with_students(conn: &mut PgConnection, lessons: Vec<Lesson>) -> Result<Vec<LessonDBResponse>> {
        let ids: Vec<LessonId> = lessons.iter().map(|l| l.id).collect();
        let rows = sqlx::query_as::<_, LessonStudentDBResponse>(
            "SELECT lesson_id, student_id, attendance_status, charged, updated_at FROM lesson_students WHERE lesson_id = ANY($1) ORDER BY student_id",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_lesson: HashMap<LessonId, Vec<LessonStudentDBResponse>> = HashMap::new();
        for row in rows {
            by_lesson.entry(row.lesson_id).or_default().push(row);
        }

        Ok(lessons
            .into_iter()
            .map(|lesson| {
                let students = by_lesson.remove(&lesson.id).unwrap_or_default();
                LessonDBResponse::from((lesson, students))
            })
            .collect())
    }

    async fn insert_students(conn: &mut PgConnection, lesson_id: LessonId, student_ids: &[UserId]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lesson_students (lesson_id, student_id)
            SELECT DISTINCT $1::uuid, s FROM UNNEST($2::uuid[]) AS s
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(lesson_id)
        .bind(student_ids)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Fetch a lesson and lock its row until the enclosing transaction ends
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    pub async fn lock(&mut self, id: LessonId) -> Result<Option<LessonDBResponse>> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        match lesson {
            Some(lesson) => Ok(Self::with_students(&mut *self.db, vec![lesson]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &LessonFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM lessons l
            WHERE ($1::uuid IS NULL OR l.teacher_id = $1)
              AND ($2::uuid IS NULL OR EXISTS (SELECT 1 FROM lesson_students ls WHERE ls.lesson_id = l.id AND ls.student_id = $2))
              AND ($3::text IS NULL OR l.status = $3)
              AND ($4::timestamptz IS NULL OR l.scheduled_at >= $4)
              AND ($5::timestamptz IS NULL OR l.scheduled_at < $5)
            "#,
        )
        .bind(filter.teacher_id)
        .bind(filter.student_id)
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// The teacher's non-cancelled lessons intersecting `[start, end)`
    #[instrument(skip(self), fields(teacher_id = %abbrev_uuid(&teacher_id)), err)]
    pub async fn teacher_slots(&mut self, teacher_id: UserId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<LessonSlotDBResponse>> {
        let slots = sqlx::query_as::<_, LessonSlotDBResponse>(
            r#"
            SELECT l.id AS lesson_id, l.teacher_id, l.status, l.scheduled_at, l.duration_minutes,
                   NULL::uuid AS student_id, NULL::text AS student_name
            FROM lessons l
            WHERE l.teacher_id = $1
              AND l.status <> 'cancelled'
              AND l.scheduled_at < $3
              AND l.scheduled_at + make_interval(mins => l.duration_minutes) > $2
            ORDER BY l.scheduled_at, l.id
            "#,
        )
        .bind(teacher_id)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(slots)
    }

    /// Seats held by any of `student_ids` in non-cancelled lessons intersecting `[start, end)`,
    /// whoever teaches them. One row per (student, lesson).
    #[instrument(skip(self, student_ids), fields(count = student_ids.len()), err)]
    pub async fn student_slots(&mut self, student_ids: &[UserId], start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<LessonSlotDBResponse>> {
        let slots = sqlx::query_as::<_, LessonSlotDBResponse>(
            r#"
            SELECT l.id AS lesson_id, l.teacher_id, l.status, l.scheduled_at, l.duration_minutes,
                   ls.student_id, COALESCE(u.display_name, u.username) AS student_name
            FROM lesson_students ls
            JOIN lessons l ON l.id = ls.lesson_id
            JOIN users u ON u.id = ls.student_id
            WHERE ls.student_id = ANY($1)
              AND l.status <> 'cancelled'
              AND l.scheduled_at < $3
              AND l.scheduled_at + make_interval(mins => l.duration_minutes) > $2
            ORDER BY l.scheduled_at, COALESCE(u.display_name, u.username), ls.student_id
            "#,
        )
        .bind(student_ids)
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(slots)
    }

    /// Lock one participant row for settlement. Concurrent settlements of the same pair queue
    /// here.
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id), student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn lock_attendance_target(&mut self, lesson_id: LessonId, student_id: UserId) -> Result<Option<AttendanceTargetDBResponse>> {
        let target = sqlx::query_as::<_, AttendanceTargetDBResponse>(
            r#"
            SELECT ls.lesson_id, ls.student_id, ls.attendance_status, ls.charged,
                   l.teacher_id, l.lesson_type_id, l.status AS lesson_status, l.scheduled_at
            FROM lesson_students ls
            JOIN lessons l ON l.id = ls.lesson_id
            WHERE ls.lesson_id = $1 AND ls.student_id = $2
            FOR UPDATE OF ls
            "#,
        )
        .bind(lesson_id)
        .bind(student_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(target)
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id), student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn record_attendance(&mut self, lesson_id: LessonId, student_id: UserId, status: AttendanceStatus, charged: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE lesson_students SET attendance_status = $3, charged = $4, updated_at = NOW() WHERE lesson_id = $1 AND student_id = $2",
        )
        .bind(lesson_id)
        .bind(student_id)
        .bind(status)
        .bind(charged)
        .execute(&mut *self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
    pub async fn pending_count(&mut self, lesson_id: LessonId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lesson_students WHERE lesson_id = $1 AND attendance_status = 'pending'")
            .bind(lesson_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Move a scheduled lesson to completed. Returns false when it was not scheduled.
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
    pub async fn mark_completed(&mut self, lesson_id: LessonId) -> Result<bool> {
        let result = sqlx::query("UPDATE lessons SET status = 'completed', updated_at = NOW() WHERE id = $1 AND status = 'scheduled'")
            .bind(lesson_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Complete every lesson among `ids` that is still scheduled and has ended by `now`
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn complete_ended(&mut self, ids: &[LessonId], now: DateTime<Utc>) -> Result<Vec<LessonId>> {
        let completed: Vec<LessonId> = sqlx::query_scalar(
            r#"
            UPDATE lessons SET status = 'completed', updated_at = NOW()
            WHERE id = ANY($1)
              AND status = 'scheduled'
              AND scheduled_at + make_interval(mins => duration_minutes) <= $2
            RETURNING id
            "#,
        )
        .bind(ids)
        .bind(now)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(completed)
    }

    /// Move a scheduled lesson to cancelled. Returns false when it was not scheduled.
    #[instrument(skip(self, reason), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
    pub async fn mark_cancelled(&mut self, lesson_id: LessonId, reason: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE lessons SET status = 'cancelled', cancellation_reason = $2, updated_at = NOW() WHERE id = $1 AND status = 'scheduled'",
        )
        .bind(lesson_id)
        .bind(reason)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Lessons<'c> {
    type CreateRequest = LessonCreateDBRequest;
    type UpdateRequest = LessonUpdateDBRequest;
    type Response = LessonDBResponse;
    type Id = LessonId;
    type Filter = LessonFilter;

    #[instrument(skip(self, request), fields(teacher_id = %abbrev_uuid(&request.teacher_id), students = request.student_ids.len()), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            INSERT INTO lessons (id, teacher_id, group_id, lesson_type_id, scheduled_at, duration_minutes, meeting_url, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LESSON_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.teacher_id)
        .bind(request.group_id)
        .bind(request.lesson_type_id)
        .bind(request.scheduled_at)
        .bind(request.duration_minutes)
        .bind(&request.meeting_url)
        .bind(request.created_by)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_students(&mut tx, lesson.id, &request.student_ids).await?;
        let created = Self::with_students(&mut tx, vec![lesson]).await?.pop().ok_or(DbError::NotFound)?;

        tx.commit().await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        match lesson {
            Some(lesson) => Ok(Self::with_students(&mut *self.db, vec![lesson]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let lessons = sqlx::query_as::<_, Lesson>(&format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        let lessons = Self::with_students(&mut *self.db, lessons).await?;
        Ok(lessons.into_iter().map(|l| (l.id, l)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let lessons = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            SELECT {LESSON_COLUMNS} FROM lessons l
            WHERE ($1::uuid IS NULL OR l.teacher_id = $1)
              AND ($2::uuid IS NULL OR EXISTS (SELECT 1 FROM lesson_students ls WHERE ls.lesson_id = l.id AND ls.student_id = $2))
              AND ($3::text IS NULL OR l.status = $3)
              AND ($4::timestamptz IS NULL OR l.scheduled_at >= $4)
              AND ($5::timestamptz IS NULL OR l.scheduled_at < $5)
            ORDER BY l.scheduled_at, l.id
            OFFSET $6 LIMIT $7
            "#
        ))
        .bind(filter.teacher_id)
        .bind(filter.student_id)
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;
        Self::with_students(&mut *self.db, lessons).await
    }

    /// Ledger rows and notifications survive with their lesson reference cleared
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE transactions SET lesson_id = NULL WHERE lesson_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE notifications SET lesson_id = NULL WHERE lesson_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1").bind(id).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(lesson_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        if let Some(teacher_id) = request.teacher_id {
            // Payments already posted belong to the current teacher, so they stay theirs until refunded
            let charged_under_other_teacher: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM lessons l
                    JOIN lesson_students ls ON ls.lesson_id = l.id
                    WHERE l.id = $1 AND ls.charged AND l.teacher_id <> $2
                )
                "#,
            )
            .bind(id)
            .bind(teacher_id)
            .fetch_one(&mut *tx)
            .await?;
            if charged_under_other_teacher {
                return Err(DbError::ProtectedEntity {
                    operation: Operation::Update,
                    reason: "charged students must be refunded before the teacher changes".to_string(),
                    entity_type: "Lesson".to_string(),
                    entity_id: Some(id.to_string()),
                });
            }
        }

        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            UPDATE lessons SET
                teacher_id = COALESCE($2, teacher_id),
                scheduled_at = COALESCE($3, scheduled_at),
                duration_minutes = COALESCE($4, duration_minutes),
                meeting_url = CASE WHEN $5::text IS NULL THEN meeting_url ELSE NULLIF($5, '') END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LESSON_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.teacher_id)
        .bind(request.scheduled_at)
        .bind(request.duration_minutes)
        .bind(&request.meeting_url)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(student_ids) = &request.student_ids {
            // A charged participant must be refunded before leaving, or their debit would dangle
            let charged_leavers: Vec<UserId> = sqlx::query_scalar(
                "SELECT student_id FROM lesson_students WHERE lesson_id = $1 AND charged AND NOT (student_id = ANY($2))",
            )
            .bind(id)
            .bind(student_ids)
            .fetch_all(&mut *tx)
            .await?;
            if !charged_leavers.is_empty() {
                return Err(DbError::ProtectedEntity {
                    operation: Operation::Update,
                    reason: format!(
                        "{} charged student(s) must be refunded before removal",
                        charged_leavers.len()
                    ),
                    entity_type: "Lesson".to_string(),
                    entity_id: Some(id.to_string()),
                });
            }

            sqlx::query("DELETE FROM lesson_students WHERE lesson_id = $1 AND NOT (student_id = ANY($2))")
                .bind(id)
                .bind(student_ids)
                .execute(&mut *tx)
                .await?;
            Self::insert_students(&mut tx, id, student_ids).await?;
        }

        let updated = Self::with_students(&mut tx, vec![lesson]).await?.pop().ok_or(DbError::NotFound)?;
        tx.commit().await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_lesson_type, create_test_user};
    use crate::db::models::users::Role;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    fn monday_at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, hour, 0, 0).unwrap()
    }

    async fn seed(pool: &PgPool, hour: u32, students: &[UserId], teacher_id: UserId, lesson_type_id: LessonTypeId) -> LessonDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        Lessons::new(&mut conn)
            .create(&LessonCreateDBRequest {
                teacher_id,
                group_id: None,
                lesson_type_id,
                scheduled_at: monday_at(hour),
                duration_minutes: 60,
                meeting_url: None,
                student_ids: students.to_vec(),
                created_by: teacher_id,
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_starts_participants_pending(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;

        let lesson = seed(&pool, 10, &[alice.id, bob.id, alice.id], teacher.id, lesson_type.id).await;

        assert_eq!(lesson.status, LessonStatus::Scheduled);
        assert_eq!(lesson.students.len(), 2, "duplicate ids collapse");
        assert!(
            lesson
                .students
                .iter()
                .all(|s| s.attendance_status == AttendanceStatus::Pending && !s.charged)
        );
        assert_eq!(lesson.ends_at(), monday_at(11));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_slot_queries_use_half_open_windows(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;
        let lesson = seed(&pool, 10, &[alice.id], teacher.id, lesson_type.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);

        let touching = repo.teacher_slots(teacher.id, monday_at(11), monday_at(12)).await.unwrap();
        assert!(touching.is_empty());

        let overlapping = repo
            .teacher_slots(teacher.id, monday_at(10) + Duration::minutes(30), monday_at(12))
            .await
            .unwrap();
        assert_eq!(overlapping.len(), 1);
        assert_eq!(overlapping[0].lesson_id, lesson.id);

        let seats = repo.student_slots(&[alice.id], monday_at(9), monday_at(11)).await.unwrap();
        assert_eq!(seats.len(), 1);
        assert_eq!(seats[0].student_id, Some(alice.id));

        assert!(repo.mark_cancelled(lesson.id, "cancelled").await.unwrap());
        assert!(repo.teacher_slots(teacher.id, monday_at(9), monday_at(12)).await.unwrap().is_empty());
        assert!(!repo.mark_cancelled(lesson.id, "cancelled").await.unwrap(), "already terminal");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_by_student_and_status(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;
        let first = seed(&pool, 9, &[alice.id], teacher.id, lesson_type.id).await;
        seed(&pool, 12, &[bob.id], teacher.id, lesson_type.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);

        let filter = LessonFilter {
            student_id: Some(alice.id),
            ..LessonFilter::new(0, 10)
        };
        let lessons = repo.list(&filter).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].id, first.id);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);

        let filter = LessonFilter {
            teacher_id: Some(teacher.id),
            status: Some(LessonStatus::Completed),
            ..LessonFilter::new(0, 10)
        };
        assert!(repo.list(&filter).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_refuses_to_drop_charged_students(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;
        let lesson = seed(&pool, 10, &[alice.id, bob.id], teacher.id, lesson_type.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);
        repo.record_attendance(lesson.id, alice.id, AttendanceStatus::Present, true).await.unwrap();

        let err = repo
            .update(
                lesson.id,
                &LessonUpdateDBRequest {
                    student_ids: Some(vec![bob.id]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));

        let updated = repo
            .update(
                lesson.id,
                &LessonUpdateDBRequest {
                    student_ids: Some(vec![alice.id]),
                    duration_minutes: Some(90),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.student_ids(), vec![alice.id]);
        assert_eq!(updated.duration_minutes, 90);
        assert_eq!(repo.pending_count(lesson.id).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_complete_ended_only_touches_finished_lessons(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;
        let early = seed(&pool, 8, &[alice.id], teacher.id, lesson_type.id).await;
        let late = seed(&pool, 15, &[alice.id], teacher.id, lesson_type.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lessons::new(&mut conn);

        let done = repo.complete_ended(&[early.id, late.id], monday_at(9)).await.unwrap();
        assert_eq!(done, vec![early.id]);
        let again = repo.complete_ended(&[early.id, late.id], monday_at(9)).await.unwrap();
        assert!(again.is_empty());
    }
}
