//! Database-backed conflict detection.
//!
//! The slot queries narrow the search to lessons intersecting the candidate window; the final
//! decision is always made by [`super::overlap`].

use super::overlap::{Booking, OverlapMatch, Seat, TimeWindow, student_conflicts, teacher_conflicts};
use crate::db::{errors::Result, handlers::Lessons, models::lessons::LessonSlotDBResponse};
use crate::errors::ScheduleConflict;
use crate::types::{LessonId, UserId};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

/// Skips rows the database returned with a degenerate duration
fn booking(slot: &LessonSlotDBResponse) -> Option<Booking> {
    let window = TimeWindow::new(slot.scheduled_at, slot.duration_minutes).ok()?;
    Some(Booking {
        lesson_id: slot.lesson_id,
        teacher_id: slot.teacher_id,
        status: slot.status,
        window,
    })
}

impl From<OverlapMatch> for ScheduleConflict {
    fn from(m: OverlapMatch) -> Self {
        Self {
            lesson_id: m.booking.lesson_id,
            teacher_id: m.booking.teacher_id,
            scheduled_at: m.booking.window.start(),
            duration_minutes: m.booking.window.duration_minutes(),
            student_id: m.student_id,
            student_name: m.student_name,
        }
    }
}

/// Teacher conflicts first, then one entry per (student, lesson) pair
#[instrument(skip(conn, student_ids), fields(teacher_id = %crate::types::abbrev_uuid(&teacher_id)), err)]
pub async fn find_conflicts(
    conn: &mut PgConnection,
    teacher_id: UserId,
    student_ids: &[UserId],
    candidate: &TimeWindow,
    exclude: Option<LessonId>,
) -> Result<Vec<ScheduleConflict>> {
    let mut lessons = Lessons::new(conn);

    let teacher_bookings: Vec<Booking> = lessons
        .teacher_slots(teacher_id, candidate.start(), candidate.end())
        .await?
        .iter()
        .filter_map(booking)
        .collect();

    let seats: Vec<Seat> = lessons
        .student_slots(student_ids, candidate.start(), candidate.end())
        .await?
        .into_iter()
        .filter_map(|slot| {
            let student_id = slot.student_id?;
            Some(Seat {
                student_id,
                booking: booking(&slot)?,
                student_name: slot.student_name,
            })
        })
        .collect();

    let wanted: HashSet<UserId> = student_ids.iter().copied().collect();
    let mut found = teacher_conflicts(teacher_id, &teacher_bookings, candidate, exclude);
    found.extend(student_conflicts(&wanted, &seats, candidate, exclude));

    Ok(found.into_iter().map(ScheduleConflict::from).collect())
}

/// "Teacher already has lesson …; Alice already has lesson …"
pub fn summarize(conflicts: &[ScheduleConflict]) -> String {
    conflicts.iter().map(ScheduleConflict::describe).collect::<Vec<_>>().join("; ")
}
