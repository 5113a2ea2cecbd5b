//! Database record models matching table schemas.
//!
//! These models are used by repositories to return query results and accept insertion/update
//! data. Database models are distinct from API models so storage and the HTTP contract can
//! evolve independently.
//!
//! - [`users`]: People and their running balances
//! - [`groups`]: Student groups and memberships
//! - [`lesson_types`]: Lesson types, prices and the teacher payment matrix
//! - [`lessons`]: Lessons, their participants and the status enums
//! - [`ledger`]: Immutable debit/credit transaction rows
//! - [`notifications`]: Inbox rows written alongside the mutations they report

pub mod groups;
pub mod ledger;
pub mod lesson_types;
pub mod lessons;
pub mod notifications;
pub mod users;
