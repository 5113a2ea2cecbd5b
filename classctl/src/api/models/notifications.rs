//! API request/response models for the notification inbox.

use super::pagination::Pagination;
use crate::{
    db::models::notifications::{NotificationDBResponse, NotificationKind},
    types::{LessonId, NotificationId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[serde_as]
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListNotificationsQuery {
    /// Inbox owner; defaults to the caller (managers may read anyone's)
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,

    /// Only unread notifications
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub unread_only: Option<bool>,

    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NotificationId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub lesson_id: Option<LessonId>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationDBResponse> for NotificationResponse {
    fn from(db: NotificationDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            kind: db.kind,
            title: db.title,
            message: db.message,
            lesson_id: db.lesson_id,
            is_read: db.is_read,
            created_at: db.created_at,
        }
    }
}
