//! Observability: metrics events and sink implementations.
//!
//! Structured logging goes through `tracing` at the call sites; this
//! module only carries counters.

pub mod metrics;
pub mod sink;


// re-exports
pub use metrics::{EntityCounters, EventOps, MetricsRecorder, MetricsReport};
pub use sink::{ExecKind, MetricsEvent, MetricsSink, PlanKind};
