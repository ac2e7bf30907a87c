//! Metrics sink boundary.
//!
//! Engine code never touches counters directly. Every instrumentation
//! point emits a [`MetricsEvent`] through the sink installed on the `Db`;
//! with no sink installed events are dropped.

use crate::db::query::AccessMode;

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Load,
    Save,
    Delete,
}

///
/// PlanKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlanKind {
    Query,
    Scan,
}

impl From<AccessMode> for PlanKind {
    fn from(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Query => Self::Query,
            AccessMode::Scan => Self::Scan,
        }
    }
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        kind: ExecKind,
        entity: &'a str,
    },
    ExecFinish {
        kind: ExecKind,
        entity: &'a str,
        rows_touched: u64,
    },
    Plan {
        kind: PlanKind,
        entity: &'a str,
    },
    RelationLoad {
        entity: &'a str,
        relation: &'a str,
        rows: u64,
    },
    ValidationFailed {
        entity: &'a str,
        field: &'a str,
    },
    TransactionCommit {
        ops: u64,
        committed: bool,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent<'_>);
}
