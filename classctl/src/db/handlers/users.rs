//! Database repository for users.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{Role, UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{UserId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, display_name, role, level_id, balance, created_at, updated_at";

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { role: None, skip, limit }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    /// Lock a user row until the enclosing transaction ends. Every balance check that precedes
    /// a debit goes through here so two settlements cannot both spend the same funds.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn lock_for_update(&mut self, id: UserId) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        user.ok_or(DbError::NotFound)
    }

    /// Display names for a set of users, falling back to the username
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn names(&mut self, ids: &[UserId]) -> Result<HashMap<UserId, String>> {
        let rows: Vec<(UserId, String)> = sqlx::query_as("SELECT id, COALESCE(display_name, username) FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Users among `ids` whose balance is below `threshold`, ordered by name
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn with_balance_below(&mut self, ids: &[UserId], threshold: Decimal) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, UserDBResponse>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) AND balance < $2 ORDER BY COALESCE(display_name, username)"
        ))
        .bind(ids)
        .bind(threshold)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(users)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            "INSERT INTO users (id, username, email, display_name, role, level_id) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(request.role)
        .bind(request.level_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<UserId>) -> Result<HashMap<UserId, UserDBResponse>> {
        let users = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE ($1::text IS NULL OR role = $1) ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        ))
        .bind(filter.role)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            r#"
            UPDATE users SET
                display_name = CASE WHEN $2::text IS NULL THEN display_name ELSE NULLIF($2, '') END,
                role = COALESCE($3, role),
                level_id = CASE WHEN $5 THEN $4 ELSE level_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.display_name)
        .bind(request.role)
        .bind(request.level_id.flatten())
        .bind(request.level_id.is_some())
        .fetch_optional(&mut *self.db)
        .await?;
        user.ok_or(DbError::NotFound)
    }
}
