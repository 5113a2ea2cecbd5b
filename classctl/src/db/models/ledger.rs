//! Database models for ledger transactions.

use crate::types::{LessonId, TransactionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Direction of a ledger row, stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Debit,
    Credit,
}

impl LedgerEntryType {
    /// The entry type that undoes this one
    pub fn reversed(self) -> Self {
        match self {
            LedgerEntryType::Debit => LedgerEntryType::Credit,
            LedgerEntryType::Credit => LedgerEntryType::Debit,
        }
    }

    /// Balance delta for an entry of this type
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            LedgerEntryType::Debit => -amount,
            LedgerEntryType::Credit => amount,
        }
    }
}

/// Database request for posting a ledger row
#[derive(Debug, Clone)]
pub struct LedgerEntryCreateDBRequest {
    pub user_id: UserId,
    pub entry_type: LedgerEntryType,
    pub amount: Decimal,
    pub lesson_id: Option<LessonId>,
    pub description: String,
    pub created_by_id: UserId,
}

/// Database response for a ledger row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerEntryDBResponse {
    pub id: TransactionId,
    pub user_id: UserId,
    pub amount: Decimal,
    #[sqlx(rename = "transaction_type")]
    pub entry_type: LedgerEntryType,
    pub lesson_id: Option<LessonId>,
    pub description: String,
    pub created_by_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A posted row together with the user's balance right after it
#[derive(Debug, Clone)]
pub struct PostedEntry {
    pub entry: LedgerEntryDBResponse,
    pub balance_after: Decimal,
}
