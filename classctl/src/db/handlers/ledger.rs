//! Database repository for the immutable transaction ledger.
//!
//! A ledger row and the matching change to `users.balance` are always written together, in one
//! transaction, by [`Ledger::post`]. Rows are never updated; a reversal is a new row of the
//! opposite type.

use crate::db::{
    errors::{DbError, Result},
    models::ledger::{LedgerEntryCreateDBRequest, LedgerEntryDBResponse, PostedEntry},
};
use crate::types::{LessonId, UserId, abbrev_uuid};
use rust_decimal::Decimal;
use sqlx::{Connection, PgConnection};
use tracing::instrument;
use uuid::Uuid;

const ENTRY_COLUMNS: &str = "id, user_id, amount, transaction_type, lesson_id, description, created_by_id, created_at";

pub struct Ledger<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Ledger<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Write one ledger row and apply it to the user's balance
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), entry_type = ?request.entry_type, amount = %request.amount), err)]
    pub async fn post(&mut self, request: &LedgerEntryCreateDBRequest) -> Result<PostedEntry> {
        if request.amount <= Decimal::ZERO {
            return Err(DbError::Other(anyhow::anyhow!(
                "Ledger amounts must be positive, got {}",
                request.amount
            )));
        }

        let mut tx = self.db.begin().await?;

        let entry = sqlx::query_as::<_, LedgerEntryDBResponse>(&format!(
            r#"
            INSERT INTO transactions (id, user_id, amount, transaction_type, lesson_id, description, created_by_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.amount)
        .bind(request.entry_type)
        .bind(request.lesson_id)
        .bind(&request.description)
        .bind(request.created_by_id)
        .fetch_one(&mut *tx)
        .await?;

        let balance_after: Option<Decimal> =
            sqlx::query_scalar("UPDATE users SET balance = balance + $2, updated_at = NOW() WHERE id = $1 RETURNING balance")
                .bind(request.user_id)
                .bind(request.entry_type.signed(request.amount))
                .fetch_optional(&mut *tx)
                .await?;
        let balance_after = balance_after.ok_or(DbError::NotFound)?;

        tx.commit().await?;

        Ok(PostedEntry { entry, balance_after })
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn balance(&mut self, user_id: UserId) -> Result<Decimal> {
        let balance: Option<Decimal> = sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;
        balance.ok_or(DbError::NotFound)
    }

    /// Σcredits − Σdebits over the user's rows, for checking the denormalized balance
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn derived_balance(&mut self, user_id: UserId) -> Result<Decimal> {
        let balance: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE WHEN transaction_type = 'credit' THEN amount ELSE -amount END), 0)
            FROM transactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(balance)
    }

    /// List transactions for a specific user with pagination, newest first
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_user_transactions(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<LedgerEntryDBResponse>> {
        let entries = sqlx::query_as::<_, LedgerEntryDBResponse>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC OFFSET $2 LIMIT $3"
        ))
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(entries)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn count_user_transactions(&mut self, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    /// Every row attached to a lesson, oldest first
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id)), err)]
    pub async fn list_lesson_transactions(&mut self, lesson_id: LessonId) -> Result<Vec<LedgerEntryDBResponse>> {
        let entries = sqlx::query_as::<_, LedgerEntryDBResponse>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM transactions WHERE lesson_id = $1 ORDER BY created_at, id"
        ))
        .bind(lesson_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Repository, Users};
    use crate::db::models::{
        ledger::LedgerEntryType,
        users::{Role, UserCreateDBRequest},
    };
    use sqlx::PgPool;

    async fn create_user(pool: &PgPool, name: &str) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                username: name.to_string(),
                email: format!("{name}@school.test"),
                display_name: None,
                role: Role::Student,
                level_id: None,
            })
            .await
            .unwrap()
            .id
    }

    fn entry(user_id: UserId, entry_type: LedgerEntryType, amount: Decimal) -> LedgerEntryCreateDBRequest {
        LedgerEntryCreateDBRequest {
            user_id,
            entry_type,
            amount,
            lesson_id: None,
            description: "test".to_string(),
            created_by_id: user_id,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_post_keeps_balance_in_step_with_rows(pool: PgPool) {
        let user_id = create_user(&pool, "erin").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut ledger = Ledger::new(&mut conn);

        let posted = ledger.post(&entry(user_id, LedgerEntryType::Credit, Decimal::new(10000, 0))).await.unwrap();
        assert_eq!(posted.balance_after, Decimal::new(10000, 0));

        let posted = ledger.post(&entry(user_id, LedgerEntryType::Debit, Decimal::new(2550, 1))).await.unwrap();
        assert_eq!(posted.balance_after, Decimal::new(97450, 1));
        assert_eq!(posted.entry.entry_type, LedgerEntryType::Debit);

        assert_eq!(ledger.balance(user_id).await.unwrap(), ledger.derived_balance(user_id).await.unwrap());
        assert_eq!(ledger.count_user_transactions(user_id).await.unwrap(), 2);

        let listed = ledger.list_user_transactions(user_id, 0, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_rejects_non_positive_amounts(pool: PgPool) {
        let user_id = create_user(&pool, "frank").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut ledger = Ledger::new(&mut conn);

        assert!(ledger.post(&entry(user_id, LedgerEntryType::Credit, Decimal::ZERO)).await.is_err());
        assert_eq!(ledger.count_user_transactions(user_id).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_rows_are_immutable(pool: PgPool) {
        let user_id = create_user(&pool, "gina").await;
        let mut conn = pool.acquire().await.unwrap();
        let posted = Ledger::new(&mut conn)
            .post(&entry(user_id, LedgerEntryType::Credit, Decimal::ONE))
            .await
            .unwrap();

        let update = sqlx::query("UPDATE transactions SET amount = 2 WHERE id = $1")
            .bind(posted.entry.id)
            .execute(&mut *conn)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(posted.entry.id)
            .execute(&mut *conn)
            .await;
        assert!(delete.is_err());
    }
}
