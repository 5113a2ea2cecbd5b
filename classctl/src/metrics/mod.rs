//! Prometheus metrics for the billing engine.
//!
//! HTTP request metrics come from `axum-prometheus`; the counters here are registered in the
//! default registry so they appear on the same `/internal/metrics` endpoint.

mod settlement;

pub use settlement::{record_batch, record_settlement};
