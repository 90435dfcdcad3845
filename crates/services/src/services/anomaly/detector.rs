use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use db::models::anomaly::AnomalyResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use ts_rs::TS;

use super::{
    alerts::AlertDispatcher,
    checks::{check_bookings, check_cancellations, check_no_shows, check_revenue},
    store::{AnomalyScope, AnomalyStore},
};

#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Body returned to whoever triggered a detection run
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub success: bool,
    pub detected: usize,
    pub anomalies: Vec<AnomalyResult>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AnomalyDetector {
    store: Arc<dyn AnomalyStore>,
    alerts: AlertDispatcher,
}

impl AnomalyDetector {
    pub fn new(store: Arc<dyn AnomalyStore>) -> Self {
        let alerts = AlertDispatcher::new(store.clone());
        Self { store, alerts }
    }

    pub fn store(&self) -> &Arc<dyn AnomalyStore> {
        &self.store
    }

    /// Run every check for `scope`. The checks share no state, so they are
    /// polled concurrently; any failing query fails the whole run. Results keep
    /// a fixed order: revenue, cancellations, no-shows, bookings.
    pub async fn detect(
        &self,
        scope: &AnomalyScope,
        today: NaiveDate,
    ) -> Result<Vec<AnomalyResult>, AnomalyError> {
        let store = self.store.as_ref();
        let (revenue, cancellations, no_shows, bookings) = futures::try_join!(
            check_revenue(store, scope, today),
            check_cancellations(store, scope, today),
            check_no_shows(store, scope, today),
            check_bookings(store, scope, today),
        )?;

        Ok([revenue, cancellations, no_shows, bookings]
            .into_iter()
            .flatten()
            .collect())
    }

    /// Detect, persist and alert. Persistence is not transactional and not
    /// deduplicated: a failed insert is logged and the run still succeeds, and
    /// running twice for the same day stores everything twice.
    pub async fn run(
        &self,
        scope: &AnomalyScope,
        now: DateTime<Utc>,
    ) -> Result<DetectionSummary, AnomalyError> {
        let anomalies = self.detect(scope, now.date_naive()).await?;

        info!(
            organization_id = %scope.organization_id,
            location_id = ?scope.location_id,
            detected = anomalies.len(),
            "Anomaly detection complete"
        );

        if !anomalies.is_empty() {
            if let Err(e) = self.store.insert_anomalies(scope, &anomalies).await {
                error!(
                    organization_id = %scope.organization_id,
                    error = %e,
                    "Failed to persist detected anomalies"
                );
            }
        }

        self.alerts.dispatch(scope, &anomalies).await;

        Ok(DetectionSummary {
            success: true,
            detected: anomalies.len(),
            anomalies,
            checked_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use db::models::anomaly::{AnomalySeverity, AnomalyType};
    use uuid::Uuid;

    use super::*;
    use crate::services::anomaly::memory::{
        AppointmentRow, FailurePlan, InMemoryAnomalyStore, SalesRow,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 18, 0, 0).unwrap()
    }

    /// Revenue down 60%, five no-shows, nothing else unusual
    fn seeded_store(org: Uuid) -> Arc<InMemoryAnomalyStore> {
        let store = Arc::new(InMemoryAnomalyStore::new());
        let today = now().date_naive();
        store.add_organization(org);
        store.add_member(org, Uuid::new_v4(), "admin");
        store.add_sales(SalesRow {
            organization_id: org,
            location_id: None,
            date: today,
            revenue: 400.0,
        });
        store.add_sales(SalesRow {
            organization_id: org,
            location_id: None,
            date: today - TimeDelta::weeks(1),
            revenue: 1000.0,
        });
        store.add_appointments(
            AppointmentRow {
                organization_id: org,
                location_id: None,
                appointment_date: today,
                status: "no_show".to_string(),
                created_at: now() - TimeDelta::days(3),
            },
            5,
        );
        store
    }

    #[tokio::test]
    async fn run_persists_and_alerts() {
        let org = Uuid::new_v4();
        let store = seeded_store(org);
        let detector = AnomalyDetector::new(store.clone());

        let summary = detector
            .run(&AnomalyScope::organization(org), now())
            .await
            .unwrap();

        assert!(summary.success);
        assert_eq!(summary.detected, 2);
        assert_eq!(summary.checked_at, now());
        let types: Vec<AnomalyType> = summary.anomalies.iter().map(|a| a.anomaly_type).collect();
        assert_eq!(types, vec![AnomalyType::RevenueDrop, AnomalyType::NoShowSurge]);
        assert!(
            summary
                .anomalies
                .iter()
                .all(|a| a.severity == AnomalySeverity::Critical)
        );

        let stored = store.anomalies();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|a| a.organization_id == org && a.location_id.is_none()));
        assert_eq!(store.notifications().len(), 2);
    }

    #[tokio::test]
    async fn running_twice_stores_duplicates() {
        let org = Uuid::new_v4();
        let store = seeded_store(org);
        let detector = AnomalyDetector::new(store.clone());
        let scope = AnomalyScope::organization(org);

        detector.run(&scope, now()).await.unwrap();
        detector.run(&scope, now()).await.unwrap();

        assert_eq!(store.anomalies().len(), 4);
    }

    #[tokio::test]
    async fn missing_revenue_row_does_not_stop_other_checks() {
        let org = Uuid::new_v4();
        let store = Arc::new(InMemoryAnomalyStore::new());
        let today = now().date_naive();
        store.add_appointments(
            AppointmentRow {
                organization_id: org,
                location_id: None,
                appointment_date: today,
                status: "no_show".to_string(),
                created_at: now(),
            },
            3,
        );
        let detector = AnomalyDetector::new(store.clone());

        let summary = detector
            .run(&AnomalyScope::organization(org), now())
            .await
            .unwrap();

        assert_eq!(summary.detected, 1);
        assert_eq!(summary.anomalies[0].anomaly_type, AnomalyType::NoShowSurge);
        assert_eq!(summary.anomalies[0].severity, AnomalySeverity::Warning);
        assert!(store.notifications().is_empty());
    }

    #[tokio::test]
    async fn quiet_day_detects_nothing() {
        let org = Uuid::new_v4();
        let store = Arc::new(InMemoryAnomalyStore::new());
        let detector = AnomalyDetector::new(store.clone());

        let summary = detector
            .run(&AnomalyScope::organization(org), now())
            .await
            .unwrap();

        assert_eq!(summary.detected, 0);
        assert!(summary.anomalies.is_empty());
        assert!(store.anomalies().is_empty());
    }

    #[tokio::test]
    async fn failed_insert_still_reports_success() {
        let org = Uuid::new_v4();
        let store = seeded_store(org);
        store.set_failures(FailurePlan {
            anomaly_insert: true,
            ..Default::default()
        });
        let detector = AnomalyDetector::new(store.clone());

        let summary = detector
            .run(&AnomalyScope::organization(org), now())
            .await
            .unwrap();

        assert_eq!(summary.detected, 2);
        assert!(store.anomalies().is_empty());
        assert_eq!(store.notifications().len(), 2);
    }

    #[tokio::test]
    async fn query_failure_fails_the_run() {
        let org = Uuid::new_v4();
        let store = seeded_store(org);
        store.set_failures(FailurePlan {
            reads: true,
            ..Default::default()
        });
        let detector = AnomalyDetector::new(store.clone());

        let err = detector
            .run(&AnomalyScope::organization(org), now())
            .await
            .unwrap_err();

        assert!(matches!(err, AnomalyError::Database(_)));
        assert!(store.anomalies().is_empty());
    }

    #[tokio::test]
    async fn serializes_summary_envelope() {
        let summary = DetectionSummary {
            success: true,
            detected: 0,
            anomalies: vec![],
            checked_at: now(),
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["detected"], 0);
        assert_eq!(value["checkedAt"], "2026-03-09T18:00:00Z");
    }
}
