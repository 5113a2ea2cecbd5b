//! Single-lesson creation and editing with conflict checks.

use super::{
    ScheduleError,
    conflicts::{find_conflicts, summarize},
    lifecycle,
    overlap::TimeWindow,
};
use crate::db::{
    handlers::{Groups, LessonTypes, Lessons, Repository, TeacherStudents, Users},
    models::{
        lesson_types::LessonTypeDBResponse,
        lessons::{LessonCreateDBRequest, LessonDBResponse, LessonUpdateDBRequest},
        users::Role,
    },
};
use crate::errors::{Error, Result};
use crate::types::{GroupId, LessonId, LessonTypeId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

/// A lesson to book. Participants are the group's members plus `student_ids`.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub teacher_id: UserId,
    pub lesson_type_id: LessonTypeId,
    pub group_id: Option<GroupId>,
    pub student_ids: Vec<UserId>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub meeting_url: Option<String>,
    pub created_by: UserId,
}

/// Union of the group's members and the explicit ids, first occurrence wins, never empty
#[instrument(skip(conn, explicit), err)]
pub async fn resolve_students(conn: &mut PgConnection, group_id: Option<GroupId>, explicit: &[UserId]) -> Result<Vec<UserId>> {
    let mut ids = Vec::new();
    if let Some(group_id) = group_id {
        let mut groups = Groups::new(&mut *conn);
        if groups.get_by_id(group_id).await?.is_none() {
            return Err(Error::NotFound {
                resource: "Group".to_string(),
                id: group_id.to_string(),
            });
        }
        ids = groups.member_ids(group_id).await?;
    }
    ids.extend_from_slice(explicit);

    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));

    if ids.is_empty() {
        return Err(ScheduleError::EmptyStudentSet.into());
    }
    Ok(ids)
}

/// Check the teacher, lesson type and students exist and have the right roles
#[instrument(skip(conn, student_ids), err)]
pub async fn validate_participants(
    conn: &mut PgConnection,
    teacher_id: UserId,
    lesson_type_id: LessonTypeId,
    student_ids: &[UserId],
) -> Result<LessonTypeDBResponse> {
    let mut users = Users::new(&mut *conn);
    match users.get_by_id(teacher_id).await? {
        Some(teacher) if teacher.role == Role::Teacher => {}
        Some(_) => {
            return Err(Error::BadRequest {
                message: format!("User {teacher_id} is not a teacher"),
            });
        }
        None => {
            return Err(Error::NotFound {
                resource: "Teacher".to_string(),
                id: teacher_id.to_string(),
            });
        }
    }

    let found = users.get_bulk(student_ids.to_vec()).await?;
    if let Some(missing) = student_ids.iter().find(|id| !found.contains_key(id)) {
        return Err(Error::NotFound {
            resource: "Student".to_string(),
            id: missing.to_string(),
        });
    }
    if let Some(not_student) = found.values().find(|u| u.role != Role::Student) {
        return Err(Error::BadRequest {
            message: format!("User {} is not a student", not_student.id),
        });
    }

    LessonTypes::new(&mut *conn)
        .get_by_id(lesson_type_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Lesson type".to_string(),
            id: lesson_type_id.to_string(),
        })
}

async fn reject_conflicts(
    conn: &mut PgConnection,
    teacher_id: UserId,
    student_ids: &[UserId],
    window: &TimeWindow,
    exclude: Option<LessonId>,
) -> Result<()> {
    let conflicts = find_conflicts(conn, teacher_id, student_ids, window, exclude).await?;
    if conflicts.is_empty() {
        return Ok(());
    }
    tracing::info!(count = conflicts.len(), "Lesson rejected because of schedule conflicts");
    Err(Error::Conflict {
        message: summarize(&conflicts),
        conflicts: Some(conflicts),
    })
}

/// Book one lesson. Any teacher or student overlap aborts the whole call.
#[instrument(skip(conn, new), fields(teacher_id = %abbrev_uuid(&new.teacher_id)), err)]
pub async fn create_lesson(conn: &mut PgConnection, new: &NewLesson) -> Result<LessonDBResponse> {
    let window = TimeWindow::new(new.scheduled_at, new.duration_minutes)?;
    let student_ids = resolve_students(&mut *conn, new.group_id, &new.student_ids).await?;
    validate_participants(&mut *conn, new.teacher_id, new.lesson_type_id, &student_ids).await?;

    reject_conflicts(&mut *conn, new.teacher_id, &student_ids, &window, None).await?;

    TeacherStudents::new(&mut *conn).link(new.teacher_id, &student_ids).await?;
    let lesson = Lessons::new(&mut *conn)
        .create(&LessonCreateDBRequest {
            teacher_id: new.teacher_id,
            group_id: new.group_id,
            lesson_type_id: new.lesson_type_id,
            scheduled_at: new.scheduled_at,
            duration_minutes: new.duration_minutes,
            meeting_url: new.meeting_url.clone(),
            student_ids,
            created_by: new.created_by,
        })
        .await?;

    tracing::info!(lesson_id = %abbrev_uuid(&lesson.id), students = lesson.students.len(), "Lesson created");
    Ok(lesson)
}

/// Edit a scheduled lesson. Changing time, teacher or participants re-runs the conflict checks
/// against everything except the lesson itself.
#[instrument(skip(conn, changes), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
pub async fn update_lesson(conn: &mut PgConnection, lesson_id: LessonId, changes: &LessonUpdateDBRequest) -> Result<LessonDBResponse> {
    let current = Lessons::new(&mut *conn).lock(lesson_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Lesson".to_string(),
        id: lesson_id.to_string(),
    })?;
    lifecycle::ensure_editable(&current)?;

    let mut changes = changes.clone();
    if let Some(student_ids) = changes.student_ids.as_mut() {
        let mut seen = HashSet::new();
        student_ids.retain(|id| seen.insert(*id));
        if student_ids.is_empty() {
            return Err(ScheduleError::EmptyStudentSet.into());
        }
    }

    let teacher_id = changes.teacher_id.unwrap_or(current.teacher_id);
    let scheduled_at = changes.scheduled_at.unwrap_or(current.scheduled_at);
    let duration_minutes = changes.duration_minutes.unwrap_or(current.duration_minutes);
    let student_ids = changes.student_ids.clone().unwrap_or_else(|| current.student_ids());

    let reschedules = changes.teacher_id.is_some()
        || changes.scheduled_at.is_some()
        || changes.duration_minutes.is_some()
        || changes.student_ids.is_some();
    if reschedules {
        let window = TimeWindow::new(scheduled_at, duration_minutes)?;
        validate_participants(&mut *conn, teacher_id, current.lesson_type_id, &student_ids).await?;
        reject_conflicts(&mut *conn, teacher_id, &student_ids, &window, Some(lesson_id)).await?;
        TeacherStudents::new(&mut *conn).link(teacher_id, &student_ids).await?;
    }

    let updated = Lessons::new(&mut *conn).update(lesson_id, &changes).await?;
    tracing::info!(lesson_id = %abbrev_uuid(&lesson_id), "Lesson updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::db::handlers::Ledger;
    use crate::db::models::lessons::AttendanceStatus;
    use crate::scheduling::settlement::{AttendanceSettlement, SettlementPolicy};
    use crate::test_utils::{create_test_group, create_test_lesson_type, create_test_user, grant_balance};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 4, 1, hour, 0, 0).unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_rejects_overlaps_with_structured_conflicts(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;

        let new = NewLesson {
            teacher_id: teacher.id,
            lesson_type_id: lesson_type.id,
            group_id: None,
            student_ids: vec![alice.id],
            scheduled_at: at(10),
            duration_minutes: 60,
            meeting_url: None,
            created_by: teacher.id,
        };

        let mut tx = pool.begin().await.unwrap();
        let first = create_lesson(&mut tx, &new).await.unwrap();

        let clash = NewLesson {
            student_ids: vec![alice.id, bob.id],
            scheduled_at: at(10) + Duration::minutes(30),
            ..new.clone()
        };
        match create_lesson(&mut tx, &clash).await.unwrap_err() {
            Error::Conflict { conflicts: Some(conflicts), .. } => {
                assert_eq!(conflicts.len(), 2, "teacher plus alice");
                assert!(conflicts.iter().all(|c| c.lesson_id == first.id));
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let back_to_back = NewLesson {
            scheduled_at: at(11),
            ..new.clone()
        };
        create_lesson(&mut tx, &back_to_back).await.unwrap();

        let links = TeacherStudents::new(&mut tx).students_of(teacher.id).await.unwrap();
        assert_eq!(links, vec![alice.id]);
        tx.commit().await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_validation_happens_before_writes(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;
        let new = NewLesson {
            teacher_id: teacher.id,
            lesson_type_id: lesson_type.id,
            group_id: None,
            student_ids: vec![],
            scheduled_at: at(10),
            duration_minutes: 60,
            meeting_url: None,
            created_by: teacher.id,
        };

        let mut conn = pool.acquire().await.unwrap();
        assert!(matches!(create_lesson(&mut conn, &new).await.unwrap_err(), Error::BadRequest { .. }));

        let student = create_test_user(&pool, Role::Student).await;
        let zero = NewLesson {
            student_ids: vec![student.id],
            duration_minutes: 0,
            ..new.clone()
        };
        assert!(matches!(create_lesson(&mut conn, &zero).await.unwrap_err(), Error::BadRequest { .. }));

        let wrong_teacher = NewLesson {
            teacher_id: student.id,
            student_ids: vec![student.id],
            ..new.clone()
        };
        assert!(matches!(create_lesson(&mut conn, &wrong_teacher).await.unwrap_err(), Error::BadRequest { .. }));

        let listed = Lessons::new(&mut conn)
            .count(&crate::db::handlers::lessons::LessonFilter::new(0, 10))
            .await
            .unwrap();
        assert_eq!(listed, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_group_members_and_explicit_ids_collapse(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;

        let group = create_test_group(&pool, Some(teacher.id), &[alice.id, bob.id]).await;

        let mut conn = pool.acquire().await.unwrap();
        let ids = resolve_students(&mut conn, Some(group.id), &[bob.id, alice.id]).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&alice.id) && ids.contains(&bob.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_excludes_itself_and_freezes_terminal_lessons(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;

        let mut tx = pool.begin().await.unwrap();
        let lesson = create_lesson(
            &mut tx,
            &NewLesson {
                teacher_id: teacher.id,
                lesson_type_id: lesson_type.id,
                group_id: None,
                student_ids: vec![alice.id],
                scheduled_at: at(10),
                duration_minutes: 60,
                meeting_url: None,
                created_by: teacher.id,
            },
        )
        .await
        .unwrap();

        // Shifting by 30 minutes overlaps only its own old slot
        let moved = update_lesson(
            &mut tx,
            lesson.id,
            &LessonUpdateDBRequest {
                scheduled_at: Some(at(10) + Duration::minutes(30)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.scheduled_at, at(10) + Duration::minutes(30));

        Lessons::new(&mut tx).mark_completed(lesson.id).await.unwrap();
        let err = update_lesson(
            &mut tx,
            lesson.id,
            &LessonUpdateDBRequest {
                duration_minutes: Some(30),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        tx.commit().await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_teacher_change_is_refused_while_someone_is_charged(pool: PgPool) {
        let first_teacher = create_test_user(&pool, Role::Teacher).await;
        let second_teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;
        grant_balance(&pool, alice.id, Decimal::new(10000, 0)).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;

        let mut tx = pool.begin().await.unwrap();
        let lesson = create_lesson(
            &mut tx,
            &NewLesson {
                teacher_id: first_teacher.id,
                lesson_type_id: lesson_type.id,
                group_id: None,
                student_ids: vec![alice.id, bob.id],
                scheduled_at: at(10),
                duration_minutes: 60,
                meeting_url: None,
                created_by: first_teacher.id,
            },
        )
        .await
        .unwrap();

        // Bob stays pending so the lesson remains editable
        AttendanceSettlement::new(&mut tx, SettlementPolicy::default(), first_teacher.id)
            .set_attendance(lesson.id, alice.id, AttendanceStatus::Present)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let err = update_lesson(
            &mut tx,
            lesson.id,
            &LessonUpdateDBRequest {
                teacher_id: Some(second_teacher.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Database(DbError::ProtectedEntity { .. })), "got {err:?}");
        drop(tx);

        // Naming the current teacher again is not a change
        let mut tx = pool.begin().await.unwrap();
        update_lesson(
            &mut tx,
            lesson.id,
            &LessonUpdateDBRequest {
                teacher_id: Some(first_teacher.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // The refund reverses against the teacher who was paid
        AttendanceSettlement::new(&mut tx, SettlementPolicy::default(), first_teacher.id)
            .set_attendance(lesson.id, alice.id, AttendanceStatus::AbsentExcused)
            .await
            .unwrap();

        let moved = update_lesson(
            &mut tx,
            lesson.id,
            &LessonUpdateDBRequest {
                teacher_id: Some(second_teacher.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.teacher_id, second_teacher.id);
        assert_eq!(Ledger::new(&mut tx).balance(second_teacher.id).await.unwrap(), Decimal::ZERO);
        tx.commit().await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_empty_meeting_url_clears_it(pool: PgPool) {
        let teacher = create_test_user(&pool, Role::Teacher).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let lesson_type = create_test_lesson_type(&pool, Decimal::new(1000, 0)).await;

        let mut tx = pool.begin().await.unwrap();
        let lesson = create_lesson(
            &mut tx,
            &NewLesson {
                teacher_id: teacher.id,
                lesson_type_id: lesson_type.id,
                group_id: None,
                student_ids: vec![alice.id],
                scheduled_at: at(10),
                duration_minutes: 60,
                meeting_url: Some("https://meet.example.com/abc".to_string()),
                created_by: teacher.id,
            },
        )
        .await
        .unwrap();

        let kept = update_lesson(
            &mut tx,
            lesson.id,
            &LessonUpdateDBRequest {
                duration_minutes: Some(45),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(kept.meeting_url.as_deref(), Some("https://meet.example.com/abc"));

        let cleared = update_lesson(
            &mut tx,
            lesson.id,
            &LessonUpdateDBRequest {
                meeting_url: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.meeting_url, None);
        tx.commit().await.unwrap();
    }
}
