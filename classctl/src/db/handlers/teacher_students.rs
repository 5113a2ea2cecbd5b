//! Database repository for the teacher↔student association.

use crate::db::errors::Result;
use crate::types::{UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

pub struct TeacherStudents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> TeacherStudents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Link each student to the teacher once. Existing links are left alone; returns how many
    /// links were new.
    #[instrument(skip(self, student_ids), fields(teacher_id = %abbrev_uuid(&teacher_id), count = student_ids.len()), err)]
    pub async fn link(&mut self, teacher_id: UserId, student_ids: &[UserId]) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO teacher_students (teacher_id, student_id)
            SELECT DISTINCT $1::uuid, s FROM UNNEST($2::uuid[]) AS s
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(teacher_id)
        .bind(student_ids)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(teacher_id = %abbrev_uuid(&teacher_id)), err)]
    pub async fn students_of(&mut self, teacher_id: UserId) -> Result<Vec<UserId>> {
        let ids: Vec<UserId> = sqlx::query_scalar("SELECT student_id FROM teacher_students WHERE teacher_id = $1 ORDER BY created_at, student_id")
            .bind(teacher_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(ids)
    }
}
