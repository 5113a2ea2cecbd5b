//! Notification emitter.
//!
//! Notifications are plain inbox rows written on the caller's connection, so a notice exists
//! exactly when the mutation it reports has committed. Delivery beyond the inbox is someone
//! else's job.

use crate::db::{
    errors::Result,
    handlers::Notifications,
    models::notifications::{NotificationCreateDBRequest, NotificationDBResponse, NotificationKind},
};
use crate::types::{LessonId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

/// A student listed in an aggregated low-balance warning
#[derive(Debug, Clone, PartialEq)]
pub struct LowBalanceStudent {
    pub name: String,
    pub balance: Decimal,
}

pub struct Notifier<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Notifier<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    async fn emit(
        &mut self,
        user_id: UserId,
        kind: NotificationKind,
        title: &str,
        message: String,
        lesson_id: Option<LessonId>,
    ) -> Result<NotificationDBResponse> {
        tracing::debug!(user_id = %crate::types::abbrev_uuid(&user_id), ?kind, "Writing notification");
        Notifications::new(&mut *self.db)
            .create(&NotificationCreateDBRequest {
                user_id,
                kind,
                title: title.to_string(),
                message,
                lesson_id,
            })
            .await
    }

    pub async fn insufficient_funds(
        &mut self,
        student_id: UserId,
        lesson_id: LessonId,
        price: Decimal,
        balance: Decimal,
    ) -> Result<NotificationDBResponse> {
        self.emit(
            student_id,
            NotificationKind::InsufficientFunds,
            "Insufficient funds",
            format!("Your lesson could not be charged: the price is {price} but your balance is {balance}. Please top up your balance."),
            Some(lesson_id),
        )
        .await
    }

    /// Zero and positive-but-low balances get different wording
    pub async fn low_balance(&mut self, student_id: UserId, lesson_id: LessonId, balance: Decimal) -> Result<NotificationDBResponse> {
        if balance.is_zero() {
            self.emit(
                student_id,
                NotificationKind::ZeroBalance,
                "Your balance is empty",
                "Your balance has reached 0. Top up to keep attending lessons.".to_string(),
                Some(lesson_id),
            )
            .await
        } else {
            self.emit(
                student_id,
                NotificationKind::LowBalance,
                "Low balance",
                format!("Your balance is running low: {balance} left. Consider topping up soon."),
                Some(lesson_id),
            )
            .await
        }
    }

    pub async fn lesson_cancelled(
        &mut self,
        student_id: UserId,
        lesson_id: LessonId,
        scheduled_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<NotificationDBResponse> {
        self.emit(
            student_id,
            NotificationKind::LessonCancelled,
            "Lesson cancelled",
            format!(
                "Your lesson on {} has been cancelled ({reason}).",
                scheduled_at.format("%Y-%m-%d %H:%M UTC")
            ),
            Some(lesson_id),
        )
        .await
    }

    /// One notice for a whole batch, listing every student who cannot cover a single lesson
    pub async fn students_low_balance(
        &mut self,
        teacher_id: UserId,
        price: Decimal,
        students: &[LowBalanceStudent],
    ) -> Result<NotificationDBResponse> {
        let listed = students
            .iter()
            .map(|s| format!("{} ({})", s.name, s.balance))
            .collect::<Vec<_>>()
            .join(", ");
        self.emit(
            teacher_id,
            NotificationKind::StudentsLowBalance,
            "Students with low balance",
            format!("These students have less than the lesson price of {price} on their balance: {listed}"),
            None,
        )
        .await
    }

    pub async fn balance_top_up(&mut self, user_id: UserId, amount: Decimal, balance: Decimal) -> Result<NotificationDBResponse> {
        self.emit(
            user_id,
            NotificationKind::BalanceTopUp,
            "Balance topped up",
            format!("{amount} was added to your balance. New balance: {balance}."),
            None,
        )
        .await
    }
}
