//! HTTP handlers for the notification inbox.

use crate::{
    AppState,
    api::models::{
        notifications::{ListNotificationsQuery, NotificationResponse},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    auth::permissions,
    db::handlers::{Notifications, notifications::NotificationFilter},
    errors::{Error, Result},
    types::{NotificationId, Operation},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};

/// List notifications, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    summary = "List notifications",
    description = "Lists the caller's inbox. Managers may pass `user_id` to read someone else's.",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Paginated notifications", body = PaginatedResponse<NotificationResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Cannot read another user's notifications"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<NotificationResponse>>> {
    let owner = query.user_id.unwrap_or(current_user.id);
    permissions::require_self_or_staff(&current_user, owner, Operation::Read, "notifications")?;

    let (skip, limit) = query.pagination.params();
    let filter = NotificationFilter {
        user_id: owner,
        unread_only: query.unread_only.unwrap_or(false),
        skip,
        limit,
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut pool_conn);
    let notifications = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        notifications.into_iter().map(NotificationResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Mark one of the caller's notifications read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    summary = "Mark a notification read",
    params(("id" = uuid::Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found"),
    ),
    security(("X-Classctl-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
    current_user: CurrentUser,
) -> Result<Json<NotificationResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let notification = Notifications::new(&mut pool_conn)
        .mark_read(id, current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Notification".to_string(),
            id: id.to_string(),
        })?;

    Ok(Json(NotificationResponse::from(notification)))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{notifications::NotificationResponse, pagination::PaginatedResponse, users::Role},
        db::models::notifications::NotificationKind,
        test_utils::*,
    };
    use serde_json::json;
    use sqlx::PgPool;

    async fn top_up(app: &axum_test::TestServer, manager: &crate::db::models::users::UserDBResponse, user_id: crate::types::UserId) {
        let (name, value) = add_auth_headers(manager).remove(0);
        app.post(&format!("/api/v1/users/{user_id}/balance/top-ups"))
            .add_header(&name, &value)
            .json(&json!({"amount": "500"}))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_top_up_lands_in_inbox_and_can_be_read(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let manager = create_test_user(&pool, Role::Manager).await;
        let student = create_test_user(&pool, Role::Student).await;
        top_up(&app, &manager, student.id).await;
        let (name, value) = add_auth_headers(&student).remove(0);

        let page: PaginatedResponse<NotificationResponse> = app
            .get("/api/v1/notifications?unread_only=true")
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].kind, NotificationKind::BalanceTopUp);
        assert!(!page.data[0].is_read);

        let read: NotificationResponse = app
            .post(&format!("/api/v1/notifications/{}/read", page.data[0].id))
            .add_header(&name, &value)
            .await
            .json();
        assert!(read.is_read);

        let unread: PaginatedResponse<NotificationResponse> = app
            .get("/api/v1/notifications?unread_only=true")
            .add_header(&name, &value)
            .await
            .json();
        assert_eq!(unread.total_count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cannot_touch_someone_elses_inbox(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let manager = create_test_user(&pool, Role::Manager).await;
        let alice = create_test_user(&pool, Role::Student).await;
        let bob = create_test_user(&pool, Role::Student).await;
        top_up(&app, &manager, alice.id).await;

        let (name, value) = add_auth_headers(&bob).remove(0);
        app.get(&format!("/api/v1/notifications?user_id={}", alice.id))
            .add_header(&name, &value)
            .await
            .assert_status_forbidden();

        let (manager_name, manager_value) = add_auth_headers(&manager).remove(0);
        let page: PaginatedResponse<NotificationResponse> = app
            .get(&format!("/api/v1/notifications?user_id={}", alice.id))
            .add_header(&manager_name, &manager_value)
            .await
            .json();
        assert_eq!(page.total_count, 1);

        app.post(&format!("/api/v1/notifications/{}/read", page.data[0].id))
            .add_header(&name, &value)
            .await
            .assert_status_not_found();
    }
}
