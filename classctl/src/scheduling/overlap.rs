//! Interval overlap checks for double-booking detection.
//!
//! A lesson occupies the half-open window `[scheduled_at, scheduled_at + duration)`, so a lesson
//! ending at 10:00 does not clash with one starting at 10:00. Everything here is pure; loading
//! the bookings is [`super::conflicts`]'s job.

use super::ScheduleError;
use crate::db::models::lessons::LessonStatus;
use crate::types::{LessonId, UserId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Half-open time window `[start, start + duration)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    duration_minutes: i32,
}

impl TimeWindow {
    /// Rejects non-positive durations so degenerate windows never reach the checker
    pub fn new(start: DateTime<Utc>, duration_minutes: i32) -> Result<Self, ScheduleError> {
        if duration_minutes <= 0 {
            return Err(ScheduleError::NonPositiveDuration(duration_minutes));
        }
        Ok(Self { start, duration_minutes })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn duration_minutes(&self) -> i32 {
        self.duration_minutes
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// An existing lesson as seen by the overlap checker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub lesson_id: LessonId,
    pub teacher_id: UserId,
    pub status: LessonStatus,
    pub window: TimeWindow,
}

/// A student's seat in an existing lesson
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub student_id: UserId,
    pub student_name: Option<String>,
    pub booking: Booking,
}

/// A booking that overlaps the candidate window. `student_id` is set for student conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapMatch {
    pub booking: Booking,
    pub student_id: Option<UserId>,
    pub student_name: Option<String>,
}

fn blocks(booking: &Booking, candidate: &TimeWindow, exclude: Option<LessonId>) -> bool {
    booking.status != LessonStatus::Cancelled && Some(booking.lesson_id) != exclude && booking.window.overlaps(candidate)
}

/// Generic contract: every owner window that blocks the candidate, skipping `exclude`
pub fn conflicts<'a>(
    owner_windows: impl IntoIterator<Item = &'a Booking>,
    candidate: &TimeWindow,
    exclude: Option<LessonId>,
) -> Vec<&'a Booking> {
    owner_windows.into_iter().filter(|b| blocks(b, candidate, exclude)).collect()
}

/// Lessons of `teacher_id` that overlap the candidate window
pub fn teacher_conflicts(teacher_id: UserId, bookings: &[Booking], candidate: &TimeWindow, exclude: Option<LessonId>) -> Vec<OverlapMatch> {
    conflicts(bookings.iter().filter(|b| b.teacher_id == teacher_id), candidate, exclude)
        .into_iter()
        .map(|booking| OverlapMatch {
            booking: booking.clone(),
            student_id: None,
            student_name: None,
        })
        .collect()
}

/// One match per (student, lesson) pair for every seat held by a student in `students` whose
/// lesson overlaps the candidate window, regardless of who teaches it
pub fn student_conflicts(students: &HashSet<UserId>, seats: &[Seat], candidate: &TimeWindow, exclude: Option<LessonId>) -> Vec<OverlapMatch> {
    let mut seen = HashSet::new();
    seats
        .iter()
        .filter(|seat| students.contains(&seat.student_id))
        .filter(|seat| blocks(&seat.booking, candidate, exclude))
        .filter(|seat| seen.insert((seat.student_id, seat.booking.lesson_id)))
        .map(|seat| OverlapMatch {
            booking: seat.booking.clone(),
            student_id: Some(seat.student_id),
            student_name: seat.student_name.clone(),
        })
        .collect()
}
