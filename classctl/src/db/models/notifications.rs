//! Database models for notifications.

use crate::types::{LessonId, NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// What a notification reports, stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InsufficientFunds,
    LowBalance,
    ZeroBalance,
    LessonCancelled,
    StudentsLowBalance,
    BalanceTopUp,
}

#[derive(Debug, Clone)]
pub struct NotificationCreateDBRequest {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub lesson_id: Option<LessonId>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationDBResponse {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub lesson_id: Option<LessonId>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
