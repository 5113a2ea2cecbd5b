//! REST API for scheduling, attendance and billing.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response structures
//!
//! # API Structure
//!
//! Everything is mounted under `/api/v1`:
//!
//! - **Lessons** (`/lessons/*`): booking, recurring batches, edits, cancellation, listing
//! - **Attendance** (`/lessons/{id}/attendance/*`): marks that settle charges and payments
//! - **Balances** (`/users/{id}/balance`, `/users/{id}/transactions`): top-ups and ledger history
//! - **Notifications** (`/notifications/*`): the per-user inbox
//!
//! The OpenAPI document is at `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
