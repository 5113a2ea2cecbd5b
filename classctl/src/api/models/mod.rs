//! API request and response data models.
//!
//! These structures define the HTTP contract. They are kept apart from [`crate::db::models`] so
//! the storage layout can change without breaking clients, and every one is annotated with
//! `utoipa` for the generated OpenAPI document.
//!
//! - [`users`]: The authenticated caller
//! - [`lessons`]: Lesson create/update/cancel payloads, schedule views and recurring batches
//! - [`attendance`]: Attendance marks and the settlement outcome per student
//! - [`transactions`]: Balance top-ups, ledger rows and balances
//! - [`notifications`]: Inbox entries
//! - [`pagination`]: Offset pagination shared by list endpoints

pub mod attendance;
pub mod lessons;
pub mod notifications;
pub mod pagination;
pub mod transactions;
pub mod users;
