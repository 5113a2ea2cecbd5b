//! Database repository for lesson types and the teacher payment matrix.

use crate::db::{
    errors::Result,
    models::lesson_types::{LessonTypeCreateDBRequest, LessonTypeDBResponse, TeacherPaymentDBResponse},
};
use crate::types::{LessonTypeId, LevelId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct LessonTypes<'c> {
    db: &'c mut PgConnection,
}

impl<'c> LessonTypes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &LessonTypeCreateDBRequest) -> Result<LessonTypeDBResponse> {
        let lesson_type = sqlx::query_as::<_, LessonTypeDBResponse>(
            "INSERT INTO lesson_types (id, name, price) VALUES ($1, $2, $3) RETURNING id, name, price, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(request.price)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(lesson_type)
    }

    #[instrument(skip(self), fields(lesson_type_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: LessonTypeId) -> Result<Option<LessonTypeDBResponse>> {
        let lesson_type = sqlx::query_as::<_, LessonTypeDBResponse>("SELECT id, name, price, created_at FROM lesson_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(lesson_type)
    }

    /// Matrix value for a teacher level and lesson type, if the matrix has one
    #[instrument(skip(self), err)]
    pub async fn teacher_payment(&mut self, level_id: LevelId, lesson_type_id: LessonTypeId) -> Result<Option<Decimal>> {
        let payment: Option<Decimal> =
            sqlx::query_scalar("SELECT teacher_payment FROM level_lesson_type_payments WHERE level_id = $1 AND lesson_type_id = $2")
                .bind(level_id)
                .bind(lesson_type_id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(payment)
    }

    #[instrument(skip(self), err)]
    pub async fn set_teacher_payment(
        &mut self,
        level_id: LevelId,
        lesson_type_id: LessonTypeId,
        teacher_payment: Decimal,
    ) -> Result<TeacherPaymentDBResponse> {
        let row = sqlx::query_as::<_, TeacherPaymentDBResponse>(
            r#"
            INSERT INTO level_lesson_type_payments (level_id, lesson_type_id, teacher_payment)
            VALUES ($1, $2, $3)
            ON CONFLICT (level_id, lesson_type_id) DO UPDATE SET teacher_payment = EXCLUDED.teacher_payment
            RETURNING level_id, lesson_type_id, teacher_payment
            "#,
        )
        .bind(level_id)
        .bind(lesson_type_id)
        .bind(teacher_payment)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(row)
    }

    /// Create a teacher level
    #[instrument(skip(self), err)]
    pub async fn create_level(&mut self, name: &str) -> Result<LevelId> {
        let id: LevelId = sqlx::query_scalar("INSERT INTO levels (id, name) VALUES ($1, $2) RETURNING id")
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(id)
    }
}
