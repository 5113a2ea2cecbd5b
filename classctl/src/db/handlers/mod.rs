//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (usually a transaction opened by the caller),
//! runs the queries for one table and returns models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Users`]: People, roles, levels and row locks on balances
//! - [`Groups`]: Groups and their student membership
//! - [`TeacherStudents`]: The teacher↔student association
//! - [`LessonTypes`]: Prices and the teacher payment matrix
//! - [`Lessons`]: Lessons, participants, attendance rows and conflict slot queries
//! - [`Ledger`]: Immutable transaction rows posted together with the balance change
//! - [`Notifications`]: Inbox rows
//!
//! # Common Pattern
//!
//! ```ignore
//! use classctl::db::handlers::{Lessons, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let lesson = Lessons::new(&mut tx).get_by_id(lesson_id).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod groups;
pub mod ledger;
pub mod lesson_types;
pub mod lessons;
pub mod notifications;
pub mod repository;
pub mod teacher_students;
pub mod users;

pub use groups::Groups;
pub use ledger::Ledger;
pub use lesson_types::LessonTypes;
pub use lessons::Lessons;
pub use notifications::Notifications;
pub use repository::Repository;
pub use teacher_students::TeacherStudents;
pub use users::Users;
