//! API models for the authenticated caller.

use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use crate::db::models::users::Role;

/// The user a request is acting as, resolved from the trusted proxy header
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            role: db.role,
            display_name: db.display_name,
        }
    }
}
