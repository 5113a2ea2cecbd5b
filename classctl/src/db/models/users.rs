//! Database models for users.

use crate::types::{LevelId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role of a person in the school
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Teacher,
    Student,
}

impl Role {
    /// Managers and admins may act on any lesson or ledger
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub level_id: Option<LevelId>,
}

/// Database request for updating a user. `None` leaves a field unchanged; an empty
/// `display_name` or `Some(None)` for `level_id` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub level_id: Option<Option<LevelId>>,
}

/// Database response for a user
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub level_id: Option<LevelId>,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDBResponse {
    /// Name used in notifications and conflict reports
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}
