//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Diagnostics that are not counters go through `tracing` at the call site.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventReport, EventState, SchemaSummary};
pub use sink::{ExecKind, MetricsEvent, MetricsSink, ProviderOp, metrics_report, metrics_reset_all};
