//! Lesson scheduling and attendance billing engine.
//!
//! ```text
//!  handlers ──► batch ──► recurrence
//!     │           │
//!     │           ├─────► conflicts ──► overlap
//!     │           │          ▲
//!     ├─────────► lessons ───┘
//!     ├─────────► settlement ──► ledger + notify
//!     │
//!     └─────────► lifecycle ──► notify
//! ```
//!
//! - [`overlap`]: pure half-open interval checks over teacher and student bookings
//! - [`recurrence`]: expands a weekday pattern into concrete occurrence datetimes
//! - [`conflicts`]: loads bookings for a candidate window and runs the overlap checks
//! - [`lessons`]: single-lesson create and edit, aborting on any conflict
//! - [`lifecycle`]: the lesson status machine, including lazy auto-completion
//! - [`settlement`]: turns attendance transitions into ledger rows, at most one outstanding
//!   debit per (lesson, student)
//! - [`batch`]: creates recurring lessons occurrence by occurrence, skipping conflicts
//! - [`notify`]: writes inbox rows inside the transaction of the mutation they describe
//!
//! Every function that writes takes a `&mut PgConnection` the caller has opened as a
//! transaction, except [`batch::BatchScheduler`], which commits each occurrence on its own.

pub mod batch;
pub mod conflicts;
pub mod lessons;
pub mod lifecycle;
pub mod notify;
pub mod overlap;
pub mod recurrence;
pub mod settlement;

use crate::db::models::lessons::LessonStatus;
use thiserror::Error;

/// Validation and state-machine errors raised before anything is written
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Unknown weekday '{0}'")]
    UnknownWeekday(String),

    #[error("At least one weekday is required")]
    EmptyWeekdays,

    #[error("Week count must be positive, got {0}")]
    NonPositiveWeekCount(i32),

    #[error("Week count {requested} exceeds the maximum of {max}")]
    TooManyWeeks { requested: i32, max: i32 },

    #[error("Pattern would create {requested} lessons, the maximum is {max}")]
    TooManyOccurrences { requested: usize, max: usize },

    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("Lesson duration must be positive, got {0} minutes")]
    NonPositiveDuration(i32),

    #[error("A lesson needs at least one student")]
    EmptyStudentSet,

    #[error("Cannot move a lesson from {from:?} to {to:?}")]
    InvalidTransition { from: LessonStatus, to: LessonStatus },

    #[error("Lesson is {0:?} and can no longer be changed")]
    LessonClosed(LessonStatus),
}
