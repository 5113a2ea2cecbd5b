//! HTTP request handlers, one module per resource.
//!
//! Handlers authenticate through the [`crate::api::models::users::CurrentUser`] extractor, check
//! permissions with [`crate::auth::permissions`], and run anything that writes inside a single
//! database transaction.
//!
//! - [`lessons`]: Booking, recurring batches, edits, cancellation and listing
//! - [`attendance`]: Attendance marks and their settlement
//! - [`transactions`]: Balances, top-ups and ledger history
//! - [`notifications`]: Inbox listing and read receipts
//!
//! Errors are returned as [`crate::errors::Error`], which maps to status codes and JSON bodies.

pub mod attendance;
pub mod lessons;
pub mod notifications;
pub mod transactions;
