//! Settlement and batch counters.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, register_int_counter, register_int_counter_vec};

/// Attendance settlements by outcome
static SETTLEMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "classctl_settlements_total",
        "Attendance settlements by outcome",
        &["outcome"]
    )
    .expect("Failed to register classctl_settlements_total metric")
});

/// Lessons created by recurring batches
static BATCH_LESSONS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("classctl_batch_lessons_created_total", "Lessons created by recurring batches")
        .expect("Failed to register classctl_batch_lessons_created_total metric")
});

/// Recurring batch occurrences skipped because of a conflict
static BATCH_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("classctl_batch_conflicts_total", "Recurring batch occurrences skipped because of a conflict")
        .expect("Failed to register classctl_batch_conflicts_total metric")
});

/// Record one settlement. `outcome` is the snake_case outcome name.
pub fn record_settlement(outcome: &str) {
    SETTLEMENTS.with_label_values(&[outcome]).inc();
}

/// Record the result of one recurring batch
pub fn record_batch(created: usize, conflicts: usize) {
    BATCH_LESSONS_CREATED.inc_by(created as u64);
    BATCH_CONFLICTS.inc_by(conflicts as u64);
}
