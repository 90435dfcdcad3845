//! Anomaly detection over salon operating metrics: four threshold checks,
//! a detector that runs and persists them, and critical-alert fan-out.

pub mod alerts;
pub mod checks;
pub mod detector;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod scan;
pub mod store;

pub use alerts::{AlertDispatcher, DispatchOutcome};
pub use detector::{AnomalyDetector, AnomalyError, DetectionSummary};
pub use scan::AnomalyScanService;
pub use store::{AnomalyScope, AnomalyStore, PgAnomalyStore};
