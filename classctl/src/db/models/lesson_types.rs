//! Database models for lesson types and the teacher payment matrix.

use crate::types::{LessonTypeId, LevelId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct LessonTypeCreateDBRequest {
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LessonTypeDBResponse {
    pub id: LessonTypeId,
    pub name: String,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One cell of the payment matrix: what a teacher of `level_id` earns for a lesson of
/// `lesson_type_id`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeacherPaymentDBResponse {
    pub level_id: LevelId,
    pub lesson_type_id: LessonTypeId,
    pub teacher_payment: Decimal,
}
