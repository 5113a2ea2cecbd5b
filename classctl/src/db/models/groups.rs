//! Database models for student groups.

use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new group
#[derive(Debug, Clone)]
pub struct GroupCreateDBRequest {
    pub name: String,
    pub teacher_id: Option<UserId>,
}

/// Database response for a group
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupDBResponse {
    pub id: GroupId,
    pub name: String,
    pub teacher_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
