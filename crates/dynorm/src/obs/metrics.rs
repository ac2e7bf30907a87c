use crate::obs::sink::{ExecKind, MetricsEvent, MetricsSink, PlanKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

///
/// EventOps
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Entry points
    pub load_calls: u64,
    pub save_calls: u64,
    pub delete_calls: u64,

    // Access paths
    pub plan_query: u64,
    pub plan_scan: u64,

    // Rows touched
    pub rows_loaded: u64,
    pub rows_saved: u64,
    pub rows_deleted: u64,

    // Relations
    pub relation_loads: u64,
    pub relation_rows: u64,

    pub validation_failures: u64,

    // Transactions
    pub transactions_committed: u64,
    pub transactions_failed: u64,
    pub transaction_ops: u64,
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EntityCounters {
    pub load_calls: u64,
    pub save_calls: u64,
    pub delete_calls: u64,
    pub rows_loaded: u64,
    pub rows_saved: u64,
    pub rows_deleted: u64,
    pub validation_failures: u64,
}

///
/// MetricsReport
///
/// Point-in-time copy of the recorder state.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MetricsReport {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
    pub since: DateTime<Utc>,
}

impl MetricsReport {
    fn new() -> Self {
        Self {
            ops: EventOps::default(),
            entities: BTreeMap::new(),
            since: Utc::now(),
        }
    }
}

///
/// MetricsRecorder
///
/// In-process [`MetricsSink`] accumulating counters per operation kind
/// and per entity type.
///

pub struct MetricsRecorder {
    state: Mutex<MetricsReport>,
}

impl MetricsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MetricsReport::new()),
        }
    }

    #[must_use]
    pub fn report(&self) -> MetricsReport {
        self.state().clone()
    }

    /// Clear every counter and restart the window.
    pub fn reset(&self) {
        *self.state() = MetricsReport::new();
    }

    // Counters stay usable after a panic elsewhere; a poisoned lock is recovered.
    fn state(&self) -> MutexGuard<'_, MetricsReport> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for MetricsRecorder {
    fn record(&self, event: MetricsEvent<'_>) {
        let mut state = self.state();
        let m = &mut *state;

        match event {
            MetricsEvent::ExecStart { kind, entity } => {
                let entry = m.entities.entry(entity.to_string()).or_default();
                match kind {
                    ExecKind::Load => {
                        m.ops.load_calls = m.ops.load_calls.saturating_add(1);
                        entry.load_calls = entry.load_calls.saturating_add(1);
                    }
                    ExecKind::Save => {
                        m.ops.save_calls = m.ops.save_calls.saturating_add(1);
                        entry.save_calls = entry.save_calls.saturating_add(1);
                    }
                    ExecKind::Delete => {
                        m.ops.delete_calls = m.ops.delete_calls.saturating_add(1);
                        entry.delete_calls = entry.delete_calls.saturating_add(1);
                    }
                }
            }

            MetricsEvent::ExecFinish {
                kind,
                entity,
                rows_touched,
            } => {
                let entry = m.entities.entry(entity.to_string()).or_default();
                match kind {
                    ExecKind::Load => {
                        m.ops.rows_loaded = m.ops.rows_loaded.saturating_add(rows_touched);
                        entry.rows_loaded = entry.rows_loaded.saturating_add(rows_touched);
                    }
                    ExecKind::Save => {
                        m.ops.rows_saved = m.ops.rows_saved.saturating_add(rows_touched);
                        entry.rows_saved = entry.rows_saved.saturating_add(rows_touched);
                    }
                    ExecKind::Delete => {
                        m.ops.rows_deleted = m.ops.rows_deleted.saturating_add(rows_touched);
                        entry.rows_deleted = entry.rows_deleted.saturating_add(rows_touched);
                    }
                }
            }

            MetricsEvent::Plan { kind, .. } => match kind {
                PlanKind::Query => m.ops.plan_query = m.ops.plan_query.saturating_add(1),
                PlanKind::Scan => m.ops.plan_scan = m.ops.plan_scan.saturating_add(1),
            },

            MetricsEvent::RelationLoad { rows, .. } => {
                m.ops.relation_loads = m.ops.relation_loads.saturating_add(1);
                m.ops.relation_rows = m.ops.relation_rows.saturating_add(rows);
            }

            MetricsEvent::ValidationFailed { entity, .. } => {
                m.ops.validation_failures = m.ops.validation_failures.saturating_add(1);
                let entry = m.entities.entry(entity.to_string()).or_default();
                entry.validation_failures = entry.validation_failures.saturating_add(1);
            }

            MetricsEvent::TransactionCommit { ops, committed } => {
                if committed {
                    m.ops.transactions_committed = m.ops.transactions_committed.saturating_add(1);
                    m.ops.transaction_ops = m.ops.transaction_ops.saturating_add(ops);
                } else {
                    m.ops.transactions_failed = m.ops.transactions_failed.saturating_add(1);
                }
            }
        }
    }
}
