//! API request/response models for balances and ledger rows.

use crate::{
    db::models::ledger::{LedgerEntryDBResponse, LedgerEntryType},
    types::{LessonId, TransactionId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Request models

/// Credit a user's balance (manager only)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopUpCreate {
    /// Amount to credit, sent as string to preserve precision
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub description: Option<String>,
}

// Response models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TransactionId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub transaction_type: LedgerEntryType,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub lesson_id: Option<LessonId>,
    pub description: String,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntryDBResponse> for TransactionResponse {
    fn from(db: LedgerEntryDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            transaction_type: db.entry_type,
            amount: db.amount,
            lesson_id: db.lesson_id,
            description: db.description,
            created_by: db.created_by_id,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopUpResponse {
    pub transaction: TransactionResponse,
    #[schema(value_type = String)]
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String)]
    pub balance: Decimal,
}
