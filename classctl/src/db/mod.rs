//! Database layer for lessons, balances and the ledger.
//!
//! Data access follows the repository pattern over SQLx and PostgreSQL:
//!
//! ```text
//! ┌──────────────────┐
//! │ API handlers     │
//! └────────┬─────────┘
//!          ↓
//! ┌──────────────────┐
//! │ scheduling::*    │  (conflicts, lifecycle, settlement)
//! └────────┬─────────┘
//!          ↓
//! ┌──────────────────┐
//! │ db::handlers     │  (one repository per table)
//! └────────┬─────────┘
//!          ↓
//! ┌──────────────────┐
//! │ PostgreSQL       │
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Records matching the table schemas
//! - [`errors`]: Database error type and constraint classification
//!
//! # Transactions
//!
//! Anything that moves money must run on a transaction, and the user row must be locked with
//! [`handlers::Users::lock_for_update`] before the balance is read, so the ledger row and the
//! cached balance always change together:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! Users::new(&mut tx).lock_for_update(student_id).await?;
//! let posted = Ledger::new(&mut tx).post(&request).await?;
//! tx.commit().await?;
//! ```
//!
//! Read-only lookups may use a plain pooled connection.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and run on startup through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
