//! Observability for controller operations.
//!
//! Implement [`ControllerMetrics`] to feed your monitoring system:
//!
//! ```ignore
//! use repair_kit::observability::{ControllerMetrics, Operation};
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl ControllerMetrics for PrometheusMetrics {
//!     fn record_success(&self, op: Operation, duration: Duration) {
//!         // histogram!("repair_kit_op_seconds", "op" => op.as_str()).record(duration);
//!     }
//! }
//!
//! // let controller = JobController::new(store).with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! The trait's default methods log through the `log` crate. [`NoOpMetrics`]
//! discards everything; [`OperationCounters`] keeps per-operation success and
//! failure counts in memory.

use crate::error::{Error, ErrorKind};
use dashmap::DashMap;
use std::fmt;
use std::time::Duration;

/// Controller operations, as reported to metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    RegisterOwnerAndCar,
    RegisterCar,
    ReplaceLabors,
    AddComponent,
    CalculateProfit,
    GetJobFull,
    DeleteJob,
    DeleteOwner,
    ListJobs,
    ListOwners,
    ListCars,
    ListOwnersWithCars,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::RegisterOwnerAndCar => "register_owner_and_car",
            Operation::RegisterCar => "register_car",
            Operation::ReplaceLabors => "replace_labors",
            Operation::AddComponent => "add_component",
            Operation::CalculateProfit => "calculate_profit",
            Operation::GetJobFull => "get_job_full",
            Operation::DeleteJob => "delete_job",
            Operation::DeleteOwner => "delete_owner",
            Operation::ListJobs => "list_jobs",
            Operation::ListOwners => "list_owners",
            Operation::ListCars => "list_cars",
            Operation::ListOwnersWithCars => "list_owners_with_cars",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for controller metrics collection.
pub trait ControllerMetrics: Send + Sync {
    /// Record a completed operation.
    fn record_success(&self, op: Operation, duration: Duration) {
        debug!("{} OK in {:?}", op, duration);
    }

    /// Record a failed operation.
    fn record_failure(&self, op: Operation, error: &Error, duration: Duration) {
        warn!("{} FAILED after {:?}: {}", op, duration, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl ControllerMetrics for NoOpMetrics {
    fn record_success(&self, _op: Operation, _duration: Duration) {}
    fn record_failure(&self, _op: Operation, _error: &Error, _duration: Duration) {}
}

/// Counts for one operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationCount {
    pub succeeded: u64,
    pub validation_failures: u64,
    pub not_found: u64,
    pub store_failures: u64,
}

impl OperationCount {
    pub fn failed(&self) -> u64 {
        self.validation_failures + self.not_found + self.store_failures
    }
}

/// In-memory per-operation counters.
///
/// Uses DashMap so concurrent requests update counts without a global lock.
#[derive(Default)]
pub struct OperationCounters {
    counts: DashMap<Operation, OperationCount>,
}

impl OperationCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counts for `op` (zero if never seen).
    pub fn get(&self, op: Operation) -> OperationCount {
        self.counts.get(&op).map(|c| *c).unwrap_or_default()
    }

    /// All counts, sorted by operation.
    pub fn snapshot(&self) -> Vec<(Operation, OperationCount)> {
        let mut all: Vec<_> = self
            .counts
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        all.sort_by_key(|(op, _)| *op);
        all
    }
}

impl ControllerMetrics for OperationCounters {
    fn record_success(&self, op: Operation, _duration: Duration) {
        self.counts.entry(op).or_default().succeeded += 1;
    }

    fn record_failure(&self, op: Operation, error: &Error, _duration: Duration) {
        let mut count = self.counts.entry(op).or_default();
        match error.kind() {
            ErrorKind::Validation => count.validation_failures += 1,
            ErrorKind::NotFound => count.not_found += 1,
            ErrorKind::Store => count.store_failures += 1,
        }
    }
}
