use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, cmp::Ordering, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory counters and simple perf totals for operations.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub perf: EventPerf,
    pub schemas: BTreeMap<String, SchemaCounters>,
    pub since_ms: i64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            perf: EventPerf::default(),
            schemas: BTreeMap::new(),
            since_ms: Utc::now().timestamp_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Context entrypoints
    pub load_calls: u64,
    pub aggregate_calls: u64,
    pub lazy_calls: u64,
    pub save_calls: u64,
    pub reload_calls: u64,

    // Provider round trips
    pub provider_calls: u64,
    pub provider_failures: u64,

    // Compilation
    pub compiled: u64,
    pub compile_errors: u64,

    // Rows
    pub rows_loaded: u64,
    pub rows_saved: u64,
    pub identity_hits: u64,
}

///
/// SchemaCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SchemaCounters {
    pub load_calls: u64,
    pub save_calls: u64,
    pub provider_calls: u64,
    pub rows_loaded: u64,
    pub rows_saved: u64,
    pub identity_hits: u64,
}

///
/// EventPerf
/// Wall-clock totals per entrypoint, in microseconds.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventPerf {
    pub load_micros_total: u128,
    pub save_micros_total: u128,
    pub reload_micros_total: u128,

    pub load_micros_max: u64,
    pub save_micros_max: u64,
    pub reload_micros_max: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all event state: counters and perf.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Accumulate a duration and track a max.
pub(crate) fn add_micros(total: &mut u128, max: &mut u64, delta: u64) {
    *total = total.saturating_add(u128::from(delta));
    if delta > *max {
        *max = delta;
    }
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters since `since_ms`.
    pub counters: Option<EventState>,
    /// Per-schema counters and averages.
    pub schema_counters: Vec<SchemaSummary>,
}

///
/// SchemaSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SchemaSummary {
    pub schema: String,
    pub load_calls: u64,
    pub save_calls: u64,
    pub provider_calls: u64,
    pub rows_loaded: u64,
    pub rows_saved: u64,
    pub identity_hits: u64,
    pub avg_rows_per_load: f64,
}

/// Build a report from the in-memory counters.
///
/// `since_ms` filters by window start, not by per-event timestamps: a
/// window that began before `since_ms` yields an empty report.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub(crate) fn report(since_ms: Option<i64>) -> EventReport {
    let snap = with_state(Clone::clone);
    if since_ms.is_some_and(|since| since > snap.since_ms) {
        return EventReport::default();
    }

    let mut schema_counters: Vec<SchemaSummary> = snap
        .schemas
        .iter()
        .map(|(schema, c)| SchemaSummary {
            schema: schema.clone(),
            load_calls: c.load_calls,
            save_calls: c.save_calls,
            provider_calls: c.provider_calls,
            rows_loaded: c.rows_loaded,
            rows_saved: c.rows_saved,
            identity_hits: c.identity_hits,
            avg_rows_per_load: if c.load_calls > 0 {
                c.rows_loaded as f64 / c.load_calls as f64
            } else {
                0.0
            },
        })
        .collect();

    schema_counters.sort_by(|a, b| {
        b.avg_rows_per_load
            .partial_cmp(&a.avg_rows_per_load)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.rows_loaded.cmp(&a.rows_loaded))
            .then_with(|| a.schema.cmp(&b.schema))
    });

    EventReport {
        counters: Some(snap),
        schema_counters,
    }
}

///
/// TESTS
///
