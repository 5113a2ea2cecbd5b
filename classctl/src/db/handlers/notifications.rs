//! Database repository for the notification inbox.

use crate::db::{
    errors::Result,
    models::notifications::{NotificationCreateDBRequest, NotificationDBResponse},
};
use crate::types::{LessonId, NotificationId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, lesson_id, is_read, created_at";

/// Filter for listing a user's notifications
#[derive(Debug, Clone)]
pub struct NotificationFilter {
    pub user_id: UserId,
    pub unread_only: bool,
    pub skip: i64,
    pub limit: i64,
}

pub struct Notifications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), kind = ?request.kind), err)]
    pub async fn create(&mut self, request: &NotificationCreateDBRequest) -> Result<NotificationDBResponse> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(&format!(
            "INSERT INTO notifications (id, user_id, kind, title, message, lesson_id) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.kind)
        .bind(&request.title)
        .bind(&request.message)
        .bind(request.lesson_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(notification)
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id)), err)]
    pub async fn list(&mut self, filter: &NotificationFilter) -> Result<Vec<NotificationDBResponse>> {
        let notifications = sqlx::query_as::<_, NotificationDBResponse>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            OFFSET $3 LIMIT $4
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.unread_only)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(notifications)
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id)), err)]
    pub async fn count(&mut self, filter: &NotificationFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read)")
            .bind(filter.user_id)
            .bind(filter.unread_only)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Mark one of the user's notifications read. Returns `None` when it does not exist or
    /// belongs to someone else.
    #[instrument(skip(self), fields(notification_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_read(&mut self, id: NotificationId, user_id: UserId) -> Result<Option<NotificationDBResponse>> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(&format!(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(notification)
    }

    /// Notifications written about one lesson, oldest first
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
    pub async fn list_for_lesson(&mut self, lesson_id: LessonId) -> Result<Vec<NotificationDBResponse>> {
        let notifications = sqlx::query_as::<_, NotificationDBResponse>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE lesson_id = $1 ORDER BY created_at, id"
        ))
        .bind(lesson_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(notifications)
    }

    /// Every notification a user has received, oldest first
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_all_for_user(&mut self, user_id: UserId) -> Result<Vec<NotificationDBResponse>> {
        let notifications = sqlx::query_as::<_, NotificationDBResponse>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(notifications)
    }
}
