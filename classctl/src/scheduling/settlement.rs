//! Attendance settlement.
//!
//! Turns an attendance transition into ledger rows:
//!
//! | new status  | `charged` | effect                                                     |
//! |-------------|-----------|------------------------------------------------------------|
//! | chargeable  | false     | debit student, credit teacher, `charged = true`            |
//! | chargeable  | true      | nothing posted ([`SettlementOutcome::AlreadyCharged`])     |
//! | not billed  | true      | credit student, reverse matrix teacher payment, `charged = false` |
//! | not billed  | false     | nothing posted ([`SettlementOutcome::NoChange`])           |
//!
//! A student who cannot cover the price is not charged; the attendance mark is still recorded
//! and the student gets an insufficient-funds notice instead.
//!
//! The participant row is locked (`FOR UPDATE`) before `charged` is read and the student's user
//! row is locked before the balance check, so concurrent calls for the same pair serialize and
//! at most one debit is ever outstanding. Everything runs on the caller's connection; callers
//! open a transaction around each call so no partial settlement is visible.

use super::{ScheduleError, lifecycle, notify::Notifier};
use crate::db::{
    handlers::{Ledger, LessonTypes, Lessons, Users},
    models::{
        ledger::{LedgerEntryCreateDBRequest, LedgerEntryType},
        lessons::{AttendanceStatus, AttendanceTargetDBResponse, LessonStatus},
        users::UserDBResponse,
    },
};
use crate::errors::{Error, Result};
use crate::metrics;
use crate::types::{LessonId, LessonTypeId, UserId, abbrev_uuid};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::instrument;
use utoipa::ToSchema;

/// Billing rules applied by [`AttendanceSettlement`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementPolicy {
    /// Balances below this after a charge trigger a low-balance notice
    pub low_balance_threshold: Decimal,
    /// Share of the price paid to a teacher when the payment matrix has no entry
    pub fallback_ratio: Decimal,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            low_balance_threshold: Decimal::new(5000, 0),
            fallback_ratio: Decimal::new(5, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    Charged,
    AlreadyCharged,
    InsufficientFunds,
    Refunded,
    NoChange,
}

impl SettlementOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SettlementOutcome::Charged => "charged",
            SettlementOutcome::AlreadyCharged => "already_charged",
            SettlementOutcome::InsufficientFunds => "insufficient_funds",
            SettlementOutcome::Refunded => "refunded",
            SettlementOutcome::NoChange => "no_change",
        }
    }
}

/// Where a teacher's pay for a lesson came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherPayment {
    /// Looked up in the (teacher level, lesson type) matrix
    Matrix(Decimal),
    /// `price * fallback_ratio`, used when the matrix has no entry
    Fallback(Decimal),
}

impl TeacherPayment {
    pub fn amount(self) -> Decimal {
        match self {
            TeacherPayment::Matrix(amount) | TeacherPayment::Fallback(amount) => amount,
        }
    }
}

/// Result of settling one (lesson, student) pair
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReport {
    pub lesson_id: LessonId,
    pub student_id: UserId,
    pub attendance_status: AttendanceStatus,
    pub outcome: SettlementOutcome,
    pub charged: bool,
    /// Student balance after the call, when the call read it
    pub student_balance: Option<Decimal>,
}

/// Reports for a whole lesson plus whether the lesson completed as a result
#[derive(Debug, Clone, PartialEq)]
pub struct LessonSettlement {
    pub reports: Vec<SettlementReport>,
    pub lesson_completed: bool,
}

pub struct AttendanceSettlement<'c> {
    db: &'c mut PgConnection,
    policy: SettlementPolicy,
    actor: UserId,
}

impl<'c> AttendanceSettlement<'c> {
    /// `actor` is recorded as `created_by_id` on every ledger row this settlement posts
    pub fn new(db: &'c mut PgConnection, policy: SettlementPolicy, actor: UserId) -> Self {
        Self { db, policy, actor }
    }

    /// Settle one student and complete the lesson if nobody is left pending
    #[instrument(skip(self), fields(lesson_id = %abbrev_uuid(&lesson_id), student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn set_attendance(&mut self, lesson_id: LessonId, student_id: UserId, status: AttendanceStatus) -> Result<LessonSettlement> {
        let report = self.settle(lesson_id, student_id, status).await?;
        let lesson_completed = lifecycle::complete_if_settled(&mut *self.db, lesson_id).await?;
        Ok(LessonSettlement {
            reports: vec![report],
            lesson_completed,
        })
    }

    /// Settle several students of one lesson, then run a single completion check
    #[instrument(skip(self, marks), fields(lesson_id = %abbrev_uuid(&lesson_id), count = marks.len()), err)]
    pub async fn set_attendance_bulk(&mut self, lesson_id: LessonId, marks: &[(UserId, AttendanceStatus)]) -> Result<LessonSettlement> {
        let mut reports = Vec::with_capacity(marks.len());
        for (student_id, status) in marks {
            reports.push(self.settle(lesson_id, *student_id, *status).await?);
        }
        let lesson_completed = lifecycle::complete_if_settled(&mut *self.db, lesson_id).await?;
        Ok(LessonSettlement { reports, lesson_completed })
    }

    async fn settle(&mut self, lesson_id: LessonId, student_id: UserId, status: AttendanceStatus) -> Result<SettlementReport> {
        let target = Lessons::new(&mut *self.db)
            .lock_attendance_target(lesson_id, student_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Lesson participant".to_string(),
                id: format!("{lesson_id}/{student_id}"),
            })?;

        if target.lesson_status == LessonStatus::Cancelled {
            return Err(ScheduleError::LessonClosed(LessonStatus::Cancelled).into());
        }

        let (outcome, charged, student_balance) = match (status.is_chargeable(), target.charged) {
            (true, false) => self.charge(&target).await?,
            (true, true) => (SettlementOutcome::AlreadyCharged, true, None),
            (false, true) => self.refund(&target).await?,
            (false, false) => (SettlementOutcome::NoChange, false, None),
        };

        Lessons::new(&mut *self.db)
            .record_attendance(lesson_id, student_id, status, charged)
            .await?;

        metrics::record_settlement(outcome.as_str());
        match outcome {
            SettlementOutcome::InsufficientFunds => tracing::warn!(
                lesson_id = %abbrev_uuid(&lesson_id),
                student_id = %abbrev_uuid(&student_id),
                "Student could not cover the lesson price, attendance recorded without charge"
            ),
            SettlementOutcome::Charged | SettlementOutcome::Refunded => tracing::info!(
                lesson_id = %abbrev_uuid(&lesson_id),
                student_id = %abbrev_uuid(&student_id),
                outcome = outcome.as_str(),
                ?status,
                "Attendance settled"
            ),
            SettlementOutcome::AlreadyCharged | SettlementOutcome::NoChange => tracing::debug!(
                lesson_id = %abbrev_uuid(&lesson_id),
                student_id = %abbrev_uuid(&student_id),
                outcome = outcome.as_str(),
                "Attendance recorded, nothing to post"
            ),
        }

        Ok(SettlementReport {
            lesson_id,
            student_id,
            attendance_status: status,
            outcome,
            charged,
            student_balance,
        })
    }

    async fn charge(&mut self, target: &AttendanceTargetDBResponse) -> Result<(SettlementOutcome, bool, Option<Decimal>)> {
        let (price, description) = self.price_and_description(target, "Lesson").await?;

        let student = Users::new(&mut *self.db).lock_for_update(target.student_id).await?;
        if student.balance < price {
            Notifier::new(&mut *self.db)
                .insufficient_funds(target.student_id, target.lesson_id, price, student.balance)
                .await?;
            return Ok((SettlementOutcome::InsufficientFunds, false, Some(student.balance)));
        }

        let balance_after = self
            .post(target.student_id, LedgerEntryType::Debit, price, target.lesson_id, &description)
            .await?
            .unwrap_or(student.balance);

        let teacher = Users::new(&mut *self.db).lock_for_update(target.teacher_id).await?;
        let payment = self.teacher_payment(&teacher, target.lesson_type_id, price).await?;
        self.post(
            target.teacher_id,
            LedgerEntryType::Credit,
            payment.amount(),
            target.lesson_id,
            &format!("Payment for {description}"),
        )
        .await?;

        // Free lessons move no money, so they cannot lower a balance
        if price > Decimal::ZERO && balance_after < self.policy.low_balance_threshold {
            Notifier::new(&mut *self.db)
                .low_balance(target.student_id, target.lesson_id, balance_after)
                .await?;
        }

        Ok((SettlementOutcome::Charged, true, Some(balance_after)))
    }

    async fn refund(&mut self, target: &AttendanceTargetDBResponse) -> Result<(SettlementOutcome, bool, Option<Decimal>)> {
        let (price, description) = self.price_and_description(target, "Refund for lesson").await?;

        let student = Users::new(&mut *self.db).lock_for_update(target.student_id).await?;
        let balance_after = self
            .post(target.student_id, LedgerEntryType::Credit, price, target.lesson_id, &description)
            .await?
            .unwrap_or(student.balance);

        let teacher = Users::new(&mut *self.db).lock_for_update(target.teacher_id).await?;
        match self.teacher_payment(&teacher, target.lesson_type_id, price).await? {
            TeacherPayment::Matrix(amount) => {
                self.post(
                    target.teacher_id,
                    LedgerEntryType::Debit,
                    amount,
                    target.lesson_id,
                    &format!("Reversal of payment for {description}"),
                )
                .await?;
            }
            TeacherPayment::Fallback(amount) => {
                // Fallback payments are not reversed; left for product to decide
                tracing::warn!(
                    teacher_id = %abbrev_uuid(&target.teacher_id),
                    lesson_id = %abbrev_uuid(&target.lesson_id),
                    %amount,
                    "Refund leaves fallback teacher payment in place"
                );
            }
        }

        Ok((SettlementOutcome::Refunded, false, Some(balance_after)))
    }

    /// Current lesson-type price and a ledger description naming the lesson
    async fn price_and_description(&mut self, target: &AttendanceTargetDBResponse, prefix: &str) -> Result<(Decimal, String)> {
        let lesson_type = LessonTypes::new(&mut *self.db)
            .get_by_id(target.lesson_type_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Lesson type".to_string(),
                id: target.lesson_type_id.to_string(),
            })?;
        let description = format!(
            "{prefix} '{}' on {}",
            lesson_type.name,
            target.scheduled_at.format("%Y-%m-%d %H:%M UTC")
        );
        Ok((lesson_type.price, description))
    }

    /// Matrix value for the teacher's level, else `price * fallback_ratio` rounded to cents
    pub async fn teacher_payment(&mut self, teacher: &UserDBResponse, lesson_type_id: LessonTypeId, price: Decimal) -> Result<TeacherPayment> {
        if let Some(level_id) = teacher.level_id {
            if let Some(amount) = LessonTypes::new(&mut *self.db).teacher_payment(level_id, lesson_type_id).await? {
                return Ok(TeacherPayment::Matrix(amount));
            }
        }
        Ok(TeacherPayment::Fallback((price * self.policy.fallback_ratio).round_dp(2)))
    }

    /// Post a row unless the amount is zero. Returns the balance after posting.
    async fn post(
        &mut self,
        user_id: UserId,
        entry_type: LedgerEntryType,
        amount: Decimal,
        lesson_id: LessonId,
        description: &str,
    ) -> Result<Option<Decimal>> {
        if amount <= Decimal::ZERO {
            return Ok(None);
        }
        let posted = Ledger::new(&mut *self.db)
            .post(&LedgerEntryCreateDBRequest {
                user_id,
                entry_type,
                amount,
                lesson_id: Some(lesson_id),
                description: description.to_string(),
                created_by_id: self.actor,
            })
            .await?;
        Ok(Some(posted.balance_after))
    }
}
