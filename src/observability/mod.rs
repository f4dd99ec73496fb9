//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//! - `events`: Kubernetes Events describing state machine transitions

pub mod events;
pub mod metrics;
