//! Periodic org-wide anomaly detection for every organization.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use super::{
    detector::{AnomalyDetector, AnomalyError},
    store::AnomalyScope,
};

/// Outcome of one pass over all organizations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub organizations: usize,
    pub failed: usize,
    pub detected: usize,
}

/// Background service that re-runs detection on an interval
pub struct AnomalyScanService {
    detector: AnomalyDetector,
    poll_interval: Duration,
}

impl AnomalyScanService {
    pub fn new(detector: AnomalyDetector, poll_interval: Duration) -> Self {
        Self {
            detector,
            poll_interval,
        }
    }

    /// Spawn the background anomaly scan service
    pub async fn spawn(
        detector: AnomalyDetector,
        poll_interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Self::new(detector, poll_interval);
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting anomaly scan service with interval {:?}",
            self.poll_interval
        );

        let mut interval = interval(self.poll_interval);

        loop {
            interval.tick().await;
            if let Err(e) = self.scan_all_organizations(Utc::now()).await {
                error!("Error listing organizations for anomaly scan: {}", e);
            }
        }
    }

    /// Run detection once per organization as of `now`. One organization
    /// failing does not stop the pass.
    pub async fn scan_all_organizations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ScanReport, AnomalyError> {
        let organization_ids = self.detector.store().organization_ids().await?;

        if organization_ids.is_empty() {
            debug!("Anomaly scan: no organizations");
            return Ok(ScanReport::default());
        }

        let mut report = ScanReport {
            organizations: organization_ids.len(),
            ..Default::default()
        };

        for organization_id in organization_ids {
            let scope = AnomalyScope::organization(organization_id);
            match self.detector.run(&scope, now).await {
                Ok(summary) => report.detected += summary.detected,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        organization_id = %organization_id,
                        error = %e,
                        "Anomaly scan failed for organization"
                    );
                }
            }
        }

        info!(
            organizations = report.organizations,
            failed = report.failed,
            detected = report.detected,
            "Anomaly scan pass complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeDelta, TimeZone};
    use uuid::Uuid;

    use super::*;
    use crate::services::anomaly::memory::{AppointmentRow, FailurePlan, InMemoryAnomalyStore};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 59).unwrap()
    }

    #[tokio::test]
    async fn scans_every_organization() {
        let store = Arc::new(InMemoryAnomalyStore::new());
        let (quiet, noisy) = (Uuid::new_v4(), Uuid::new_v4());
        store.add_organization(quiet);
        store.add_organization(noisy);
        store.add_appointments(
            AppointmentRow {
                organization_id: noisy,
                location_id: None,
                appointment_date: now().date_naive(),
                status: "no_show".to_string(),
                created_at: now() - TimeDelta::days(2),
            },
            4,
        );

        let service =
            AnomalyScanService::new(AnomalyDetector::new(store.clone()), Duration::from_secs(60));
        let report = service.scan_all_organizations(now()).await.unwrap();

        assert_eq!(
            report,
            ScanReport {
                organizations: 2,
                failed: 0,
                detected: 1
            }
        );
        assert_eq!(store.anomalies()[0].organization_id, noisy);
    }

    #[tokio::test]
    async fn listing_failure_is_reported() {
        let store = Arc::new(InMemoryAnomalyStore::new());
        store.set_failures(FailurePlan {
            reads: true,
            ..Default::default()
        });
        let service =
            AnomalyScanService::new(AnomalyDetector::new(store), Duration::from_secs(60));

        assert!(service.scan_all_organizations(now()).await.is_err());
    }
}
