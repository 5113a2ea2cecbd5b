//! Role-based access checks.
//!
//! Checks are plain functions over the authenticated [`CurrentUser`]; handlers call them after
//! loading whatever resource the decision depends on.

use crate::{
    api::models::users::CurrentUser,
    db::models::{lessons::LessonDBResponse, users::Role},
    errors::{Error, Result},
    types::{Operation, UserId},
};

fn denied(action: Operation, resource: impl Into<String>) -> Error {
    Error::InsufficientPermissions {
        action,
        resource: resource.into(),
    }
}

/// Managers and admins only
pub fn require_staff(user: &CurrentUser, action: Operation, resource: &str) -> Result<()> {
    if user.role.is_staff() {
        Ok(())
    } else {
        Err(denied(action, resource))
    }
}

/// Staff may act for anyone; everyone else only for themselves
pub fn require_self_or_staff(user: &CurrentUser, owner_id: UserId, action: Operation, resource: &str) -> Result<()> {
    if user.role.is_staff() || user.id == owner_id {
        Ok(())
    } else {
        Err(denied(action, resource))
    }
}

/// Staff may schedule for any teacher; a teacher only for themselves.
pub fn require_can_schedule_for(user: &CurrentUser, teacher_id: UserId) -> Result<()> {
    match user.role {
        Role::Admin | Role::Manager => Ok(()),
        Role::Teacher if user.id == teacher_id => Ok(()),
        _ => Err(denied(Operation::Create, "lessons for this teacher")),
    }
}

/// Update, cancel and attendance: staff, or the teacher who runs the lesson
pub fn can_manage_lesson(user: &CurrentUser, lesson: &LessonDBResponse) -> bool {
    user.role.is_staff() || (user.role == Role::Teacher && lesson.teacher_id == user.id)
}

pub fn require_manage_lesson(user: &CurrentUser, lesson: &LessonDBResponse, action: Operation) -> Result<()> {
    if can_manage_lesson(user, lesson) {
        Ok(())
    } else {
        Err(denied(action, "lesson"))
    }
}

/// Anyone who manages the lesson, plus its participants
pub fn can_read_lesson(user: &CurrentUser, lesson: &LessonDBResponse) -> bool {
    can_manage_lesson(user, lesson) || lesson.students.iter().any(|s| s.student_id == user.id)
}
