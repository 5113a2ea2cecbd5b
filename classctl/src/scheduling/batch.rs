//! Recurring lesson creation.
//!
//! A batch expands a weekday pattern into occurrences and books them one at a time, each in its
//! own transaction, so every occurrence's conflict check sees the lessons committed by the ones
//! before it. An occurrence that clashes is skipped and reported; the rest still get booked.

use super::{
    ScheduleError,
    conflicts::{find_conflicts, summarize},
    lessons::{resolve_students, validate_participants},
    notify::{LowBalanceStudent, Notifier},
    overlap::TimeWindow,
    recurrence,
};
use crate::config::SchedulingConfig;
use crate::db::{
    handlers::{Lessons, Repository, TeacherStudents, Users},
    models::lessons::{LessonCreateDBRequest, LessonDBResponse},
};
use crate::errors::{Error, Result, ScheduleConflict};
use crate::metrics;
use crate::types::{GroupId, LessonTypeId, UserId, abbrev_uuid};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;
use utoipa::ToSchema;

/// A weekday pattern to book
#[derive(Debug, Clone)]
pub struct RecurringLessonRequest {
    pub teacher_id: UserId,
    pub lesson_type_id: LessonTypeId,
    pub group_id: Option<GroupId>,
    pub student_ids: Vec<UserId>,
    pub start_date: NaiveDate,
    pub weekdays: Vec<String>,
    pub week_count: i32,
    /// Local wall-clock time, "HH:MM"
    pub time_of_day: String,
    /// Offset of the local wall clock from UTC
    pub utc_offset_minutes: i32,
    pub duration_minutes: i32,
    pub meeting_url: Option<String>,
    pub created_by: UserId,
}

/// One skipped occurrence
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchConflict {
    pub date: DateTime<Utc>,
    pub reason: String,
    pub conflicts: Vec<ScheduleConflict>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub created: Vec<LessonDBResponse>,
    pub conflicts: Vec<BatchConflict>,
}

/// Upper bounds on the work one request may ask for
#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    pub max_occurrences: usize,
    pub max_weeks: i32,
}

impl From<&SchedulingConfig> for BatchLimits {
    fn from(config: &SchedulingConfig) -> Self {
        Self {
            max_occurrences: config.max_batch_occurrences,
            max_weeks: config.max_weeks,
        }
    }
}

pub struct BatchScheduler<'a> {
    pool: &'a PgPool,
    limits: BatchLimits,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(pool: &'a PgPool, limits: BatchLimits) -> Self {
        Self { pool, limits }
    }

    /// Validate the pattern and turn it into UTC start times
    fn occurrences(&self, request: &RecurringLessonRequest) -> Result<Vec<DateTime<Utc>>> {
        if request.duration_minutes <= 0 {
            return Err(ScheduleError::NonPositiveDuration(request.duration_minutes).into());
        }
        if request.week_count <= 0 {
            return Err(ScheduleError::NonPositiveWeekCount(request.week_count).into());
        }
        if request.week_count > self.limits.max_weeks {
            return Err(ScheduleError::TooManyWeeks {
                requested: request.week_count,
                max: self.limits.max_weeks,
            }
            .into());
        }

        let weekdays = recurrence::parse_weekdays(&request.weekdays)?;
        let time_of_day = recurrence::parse_time_of_day(&request.time_of_day)?;

        let requested = recurrence::occurrence_count(&weekdays, request.week_count);
        if requested > self.limits.max_occurrences {
            return Err(ScheduleError::TooManyOccurrences {
                requested,
                max: self.limits.max_occurrences,
            }
            .into());
        }

        let offset = FixedOffset::east_opt(request.utc_offset_minutes.saturating_mul(60)).ok_or_else(|| Error::BadRequest {
            message: format!("UTC offset of {} minutes is out of range", request.utc_offset_minutes),
        })?;

        recurrence::generate(request.start_date, &weekdays, request.week_count, time_of_day)?
            .into_iter()
            .map(|local| {
                offset
                    .from_local_datetime(&local)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok_or_else(|| Error::BadRequest {
                        message: format!("{local} does not exist at UTC offset {offset}"),
                    })
            })
            .collect()
    }

    #[instrument(skip(self, request), fields(teacher_id = %abbrev_uuid(&request.teacher_id), weeks = request.week_count), err)]
    pub async fn create_recurring_lessons(&self, request: &RecurringLessonRequest) -> Result<BatchOutcome> {
        let occurrences = self.occurrences(request)?;

        let mut conn = self.pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let student_ids = resolve_students(&mut conn, request.group_id, &request.student_ids).await?;
        let lesson_type = validate_participants(&mut conn, request.teacher_id, request.lesson_type_id, &student_ids).await?;
        drop(conn);

        // One link per distinct student, not per occurrence
        let mut tx = self.pool.begin().await.map_err(|e| Error::Database(e.into()))?;
        TeacherStudents::new(&mut tx).link(request.teacher_id, &student_ids).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        let mut created = Vec::new();
        let mut conflicts = Vec::new();
        for scheduled_at in occurrences {
            let window = TimeWindow::new(scheduled_at, request.duration_minutes)?;
            let mut tx = self.pool.begin().await.map_err(|e| Error::Database(e.into()))?;

            let found = find_conflicts(&mut tx, request.teacher_id, &student_ids, &window, None).await?;
            if !found.is_empty() {
                tracing::debug!(%scheduled_at, count = found.len(), "Skipping conflicting occurrence");
                conflicts.push(BatchConflict {
                    date: scheduled_at,
                    reason: summarize(&found),
                    conflicts: found,
                });
                continue;
            }

            let lesson = Lessons::new(&mut tx)
                .create(&LessonCreateDBRequest {
                    teacher_id: request.teacher_id,
                    group_id: request.group_id,
                    lesson_type_id: request.lesson_type_id,
                    scheduled_at,
                    duration_minutes: request.duration_minutes,
                    meeting_url: request.meeting_url.clone(),
                    student_ids: student_ids.clone(),
                    created_by: request.created_by,
                })
                .await?;
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;
            created.push(lesson);
        }

        // A single warning for the whole batch
        let mut tx = self.pool.begin().await.map_err(|e| Error::Database(e.into()))?;
        let short: Vec<LowBalanceStudent> = Users::new(&mut tx)
            .with_balance_below(&student_ids, lesson_type.price)
            .await?
            .into_iter()
            .map(|u| LowBalanceStudent {
                name: u.name().to_string(),
                balance: u.balance,
            })
            .collect();
        if !short.is_empty() {
            Notifier::new(&mut tx)
                .students_low_balance(request.teacher_id, lesson_type.price, &short)
                .await?;
        }
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        metrics::record_batch(created.len(), conflicts.len());
        tracing::info!(
            teacher_id = %abbrev_uuid(&request.teacher_id),
            created = created.len(),
            conflicts = conflicts.len(),
            low_balance_students = short.len(),
            "Recurring lessons booked"
        );

        Ok(BatchOutcome { created, conflicts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Notifications;
    use crate::db::models::{notifications::NotificationKind, users::Role};
    use crate::test_utils::{create_test_lesson, create_test_lesson_type, create_test_user, grant_balance};
    use chrono::{Datelike, Weekday};
    use rust_decimal::Decimal;

    fn limits() -> BatchLimits {
        BatchLimits {
            max_occurrences: 200,
            max_weeks: 52,
        }
    }

    fn request(teacher_id: UserId, lesson_type_id: LessonTypeId, students: Vec<UserId>) -> RecurringLessonRequest {
        RecurringLessonRequest {
            teacher_id,
            lesson_type_id,
            group_id: None,
            student_ids: students,
            // A Monday
            start_date: NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
            weekdays: vec!["monday".to_string(), "wednesday".to_string(), "friday".to_string()],
            week_count: 1,
            time_of_day: "10:00".to_string(),
            utc_offset_minutes: 0,
            duration_minutes: 60,
            meeting_url: None,
            created_by: teacher_id,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_one_conflict_skips_one_occurrence(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;

        // Existing lesson of the same teacher on Wednesday 10:30
        let wednesday = Utc.with_ymd_and_hms(2030, 6, 5, 10, 30, 0).unwrap();
        let existing = create_test_lesson(&pool, teacher.id, lesson_type.id, &[bob.id], wednesday).await;

        let scheduler = BatchScheduler::new(&pool, limits());
        let outcome = scheduler
            .create_recurring_lessons(&request(teacher.id, lesson_type.id, vec![alice.id]))
            .await
            .unwrap();

        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].date.weekday(), Weekday::Wed);
        assert_eq!(outcome.conflicts[0].conflicts[0].lesson_id, existing.id);
        assert!(outcome.conflicts[0].reason.starts_with("Teacher already has lesson"));

        // The successes are persisted
        let mut conn = pool.acquire().await.unwrap();
        let mut lessons = Lessons::new(&mut conn);
        for lesson in &outcome.created {
            assert!(lessons.get_by_id(lesson.id).await.unwrap().is_some());
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_occurrences_see_earlier_ones_in_the_same_batch(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;

        // A three-day lesson from Monday runs into the same pattern's Wednesday slot
        let scheduler = BatchScheduler::new(&pool, limits());
        let mut req = request(teacher.id, lesson_type.id, vec![alice.id]);
        req.weekdays = vec!["mon".to_string(), "wed".to_string()];
        req.week_count = 1;
        req.duration_minutes = 3 * 24 * 60;

        let outcome = scheduler.create_recurring_lessons(&req).await.unwrap();
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.created[0].scheduled_at.weekday(), Weekday::Mon);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].date.weekday(), Weekday::Wed);
        assert!(outcome.conflicts.iter().flat_map(|c| &c.conflicts).all(|c| c.lesson_id == outcome.created[0].id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_single_aggregated_low_balance_warning(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;
        let carol = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;
        grant_balance(&pool, carol.id, Decimal::new(5000, 0)).await;

        let scheduler = BatchScheduler::new(&pool, limits());
        let outcome = scheduler
            .create_recurring_lessons(&request(teacher.id, lesson_type.id, vec![alice.id, bob.id, carol.id, alice.id]))
            .await
            .unwrap();
        assert_eq!(outcome.created.len(), 3);
        assert!(outcome.created.iter().all(|l| l.students.len() == 3));

        let mut conn = pool.acquire().await.unwrap();
        let notes = Notifications::new(&mut conn).list_all_for_user(teacher.id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::StudentsLowBalance);
        assert!(notes[0].message.contains(alice.name()));
        assert!(notes[0].message.contains(bob.name()));
        assert!(!notes[0].message.contains(carol.name()));

        let links = TeacherStudents::new(&mut conn).students_of(teacher.id).await.unwrap();
        assert_eq!(links.len(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_validation_errors_write_nothing(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;
        let scheduler = BatchScheduler::new(&pool, limits());

        let mut bad_day = request(teacher.id, lesson_type.id, vec![alice.id]);
        bad_day.weekdays.push("someday".to_string());
        assert!(matches!(scheduler.create_recurring_lessons(&bad_day).await, Err(Error::BadRequest { .. })));

        let mut zero_weeks = request(teacher.id, lesson_type.id, vec![alice.id]);
        zero_weeks.week_count = 0;
        assert!(matches!(scheduler.create_recurring_lessons(&zero_weeks).await, Err(Error::BadRequest { .. })));

        let too_many = BatchScheduler::new(
            &pool,
            BatchLimits {
                max_occurrences: 2,
                max_weeks: 52,
            },
        );
        assert!(matches!(
            too_many
                .create_recurring_lessons(&request(teacher.id, lesson_type.id, vec![alice.id]))
                .await,
            Err(Error::BadRequest { .. })
        ));

        let nobody = request(teacher.id, lesson_type.id, vec![]);
        assert!(matches!(scheduler.create_recurring_lessons(&nobody).await, Err(Error::BadRequest { .. })));

        let mut conn = pool.acquire().await.unwrap();
        assert!(TeacherStudents::new(&mut conn).students_of(teacher.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_offset_shifts_to_utc(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;

        let mut req = request(teacher.id, lesson_type.id, vec![alice.id]);
        req.weekdays = vec!["monday".to_string()];
        req.utc_offset_minutes = 180;

        let outcome = BatchScheduler::new(&pool, limits()).create_recurring_lessons(&req).await.unwrap();
        assert_eq!(outcome.created[0].scheduled_at, Utc.with_ymd_and_hms(2030, 6, 3, 7, 0, 0).unwrap());
    }
}
