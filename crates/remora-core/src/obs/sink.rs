//! Metrics sink boundary.
//!
//! Context and query code never touch `obs::metrics` directly; all
//! instrumentation flows through `MetricsEvent` and `MetricsSink`.
use crate::obs::metrics::{self, EventState, SchemaCounters};
use std::{cell::RefCell, rc::Rc, time::Instant};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Load,
    Aggregate,
    Lazy,
    Save,
    Reload,
}

///
/// ProviderOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProviderOp {
    GetItems,
    DefaultValues,
    BatchExecute,
    ExecuteProcess,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent<'a> {
    ExecStart {
        kind: ExecKind,
        schema: &'a str,
    },
    ExecFinish {
        kind: ExecKind,
        schema: &'a str,
        rows: u64,
        micros: u64,
    },
    ProviderCall {
        op: ProviderOp,
        schema: &'a str,
        success: bool,
    },
    IdentityHit {
        schema: &'a str,
    },
    Compile {
        ok: bool,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default sink writing into the per-thread metrics state.

pub(crate) struct GlobalMetricsSink;

fn schema_entry<'s>(m: &'s mut EventState, schema: &str) -> &'s mut SchemaCounters {
    m.schemas.entry(schema.to_string()).or_default()
}

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ExecStart { kind, schema } => metrics::with_state_mut(|m| {
                let ops = &mut m.ops;
                let counter = match kind {
                    ExecKind::Load => &mut ops.load_calls,
                    ExecKind::Aggregate => &mut ops.aggregate_calls,
                    ExecKind::Lazy => &mut ops.lazy_calls,
                    ExecKind::Save => &mut ops.save_calls,
                    ExecKind::Reload => &mut ops.reload_calls,
                };
                *counter = counter.saturating_add(1);

                let entry = schema_entry(m, schema);
                match kind {
                    ExecKind::Load | ExecKind::Lazy => {
                        entry.load_calls = entry.load_calls.saturating_add(1);
                    }
                    ExecKind::Save => entry.save_calls = entry.save_calls.saturating_add(1),
                    ExecKind::Aggregate | ExecKind::Reload => {}
                }
            }),

            MetricsEvent::ExecFinish {
                kind,
                schema,
                rows,
                micros,
            } => metrics::with_state_mut(|m| {
                match kind {
                    ExecKind::Load | ExecKind::Lazy => {
                        m.ops.rows_loaded = m.ops.rows_loaded.saturating_add(rows);
                        metrics::add_micros(
                            &mut m.perf.load_micros_total,
                            &mut m.perf.load_micros_max,
                            micros,
                        );
                        let entry = schema_entry(m, schema);
                        entry.rows_loaded = entry.rows_loaded.saturating_add(rows);
                    }
                    ExecKind::Save => {
                        m.ops.rows_saved = m.ops.rows_saved.saturating_add(rows);
                        metrics::add_micros(
                            &mut m.perf.save_micros_total,
                            &mut m.perf.save_micros_max,
                            micros,
                        );
                        let entry = schema_entry(m, schema);
                        entry.rows_saved = entry.rows_saved.saturating_add(rows);
                    }
                    ExecKind::Reload => metrics::add_micros(
                        &mut m.perf.reload_micros_total,
                        &mut m.perf.reload_micros_max,
                        micros,
                    ),
                    ExecKind::Aggregate => {}
                }
            }),

            MetricsEvent::ProviderCall {
                schema, success, ..
            } => metrics::with_state_mut(|m| {
                m.ops.provider_calls = m.ops.provider_calls.saturating_add(1);
                if !success {
                    m.ops.provider_failures = m.ops.provider_failures.saturating_add(1);
                }
                let entry = schema_entry(m, schema);
                entry.provider_calls = entry.provider_calls.saturating_add(1);
            }),

            MetricsEvent::IdentityHit { schema } => metrics::with_state_mut(|m| {
                m.ops.identity_hits = m.ops.identity_hits.saturating_add(1);
                let entry = schema_entry(m, schema);
                entry.identity_hits = entry.identity_hits.saturating_add(1);
            }),

            MetricsEvent::Compile { ok } => metrics::with_state_mut(|m| {
                if ok {
                    m.ops.compiled = m.ops.compiled.saturating_add(1);
                } else {
                    m.ops.compile_errors = m.ops.compile_errors.saturating_add(1);
                }
            }),
        }
    }
}

pub(crate) fn record(event: MetricsEvent<'_>) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GlobalMetricsSink.record(event),
    }
}

/// Snapshot the current metrics state.
///
/// `since_ms` filters by window start (`EventState::since_ms`), not by
/// per-event timestamps.
#[must_use]
pub fn metrics_report(since_ms: Option<i64>) -> metrics::EventReport {
    metrics::report(since_ms)
}

/// Reset all metrics state (counters + perf).
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub(crate) fn with_metrics_sink<T>(sink: Option<&Rc<dyn MetricsSink>>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let Some(sink) = sink else {
        return f();
    };

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(Rc::clone(sink)));
    let _guard = Guard(prev);

    f()
}

/// Span
/// RAII guard that emits start/finish metrics events for one context call.
/// Finish accounting happens even on early return or unwind.

pub(crate) struct Span<'a> {
    kind: ExecKind,
    schema: &'a str,
    start: Instant,
    rows: u64,
}

impl<'a> Span<'a> {
    #[must_use]
    pub(crate) fn new(kind: ExecKind, schema: &'a str) -> Self {
        record(MetricsEvent::ExecStart { kind, schema });

        Self {
            kind,
            schema,
            start: Instant::now(),
            rows: 0,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }
}

impl Drop for Span<'_> {
    fn drop(&mut self) {
        let micros = u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX);

        record(MetricsEvent::ExecFinish {
            kind: self.kind,
            schema: self.schema,
            rows: self.rows,
            micros,
        });
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        cell::Cell,
        panic::{AssertUnwindSafe, catch_unwind},
    };

    #[derive(Default)]
    struct CountingSink {
        calls: Cell<usize>,
    }

    impl MetricsSink for CountingSink {
        fn record(&self, _: MetricsEvent<'_>) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn clear_override() {
        SINK_OVERRIDE.with(|cell| *cell.borrow_mut() = None);
    }

    #[test]
    fn with_metrics_sink_routes_and_restores_nested_overrides() {
        clear_override();

        let outer = Rc::new(CountingSink::default());
        let inner = Rc::new(CountingSink::default());
        let outer_dyn: Rc<dyn MetricsSink> = outer.clone();
        let inner_dyn: Rc<dyn MetricsSink> = inner.clone();

        record(MetricsEvent::Compile { ok: true });
        assert_eq!(outer.calls.get(), 0);

        with_metrics_sink(Some(&outer_dyn), || {
            record(MetricsEvent::Compile { ok: true });
            with_metrics_sink(Some(&inner_dyn), || {
                record(MetricsEvent::Compile { ok: false });
            });
            record(MetricsEvent::Compile { ok: true });
        });

        assert_eq!(outer.calls.get(), 2);
        assert_eq!(inner.calls.get(), 1);
        SINK_OVERRIDE.with(|cell| assert!(cell.borrow().is_none()));
    }

    #[test]
    fn with_metrics_sink_restores_override_on_panic() {
        clear_override();

        let sink = Rc::new(CountingSink::default());
        let sink_dyn: Rc<dyn MetricsSink> = sink.clone();

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            with_metrics_sink(Some(&sink_dyn), || {
                record(MetricsEvent::Compile { ok: true });
                panic!("intentional panic for guard test");
            });
        }))
        .is_err();

        assert!(panicked);
        assert_eq!(sink.calls.get(), 1);
        SINK_OVERRIDE.with(|cell| assert!(cell.borrow().is_none()));
    }

    #[test]
    fn span_records_start_and_finish() {
        clear_override();
        metrics_reset_all();

        {
            let mut span = Span::new(ExecKind::Load, "Contact");
            span.set_rows(4);
        }

        let counters = metrics_report(None).counters.unwrap_or_default();
        assert_eq!(counters.ops.load_calls, 1);
        assert_eq!(counters.ops.rows_loaded, 4);
        assert_eq!(counters.schemas["Contact"].rows_loaded, 4);
    }

    #[test]
    fn provider_failures_are_counted_separately() {
        clear_override();
        metrics_reset_all();

        for success in [true, false, false] {
            record(MetricsEvent::ProviderCall {
                op: ProviderOp::GetItems,
                schema: "Contact",
                success,
            });
        }

        let counters = metrics_report(None).counters.unwrap_or_default();
        assert_eq!(counters.ops.provider_calls, 3);
        assert_eq!(counters.ops.provider_failures, 2);
    }
}
