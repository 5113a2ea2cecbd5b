//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for readability:
//!
//! - [`UserId`]: any person (student, teacher, manager, admin)
//! - [`LessonId`], [`LessonTypeId`], [`GroupId`], [`LevelId`]
//! - [`TransactionId`], [`NotificationId`]
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type GroupId = Uuid;
pub type LevelId = Uuid;
pub type LessonId = Uuid;
pub type LessonTypeId = Uuid;
pub type TransactionId = Uuid;
pub type NotificationId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Operations that can be attempted on a resource, used in permission errors and
/// protection rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "Create"),
            Operation::Read => write!(f, "Read"),
            Operation::Update => write!(f, "Update"),
            Operation::Delete => write!(f, "Delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviates_to_eight_chars() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
