use std::sync::Arc;

use db::models::{
    anomaly::{AnomalyResult, AnomalyType},
    notification::CreateNotification,
};
use serde_json::json;
use tracing::{debug, error, info};

use super::store::{AnomalyScope, AnomalyStore};

pub const ANOMALY_NOTIFICATION_TYPE: &str = "anomaly_alert";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub notifications_created: usize,
    pub recipients: usize,
}

/// Writes one organization-feed notification per critical anomaly. Every
/// owner/admin/manager sees the feed; there is no per-recipient row.
#[derive(Clone)]
pub struct AlertDispatcher {
    store: Arc<dyn AnomalyStore>,
}

impl AlertDispatcher {
    pub fn new(store: Arc<dyn AnomalyStore>) -> Self {
        Self { store }
    }

    /// Failures are logged and swallowed; notifications already written stay.
    pub async fn dispatch(&self, scope: &AnomalyScope, results: &[AnomalyResult]) -> DispatchOutcome {
        let critical: Vec<&AnomalyResult> = results.iter().filter(|r| r.is_critical()).collect();
        if critical.is_empty() {
            return DispatchOutcome::default();
        }

        let recipients = match self.store.alert_recipients(scope.organization_id).await {
            Ok(recipients) => recipients,
            Err(e) => {
                error!(
                    organization_id = %scope.organization_id,
                    error = %e,
                    "Failed to resolve alert recipients"
                );
                return DispatchOutcome::default();
            }
        };

        if recipients.is_empty() {
            debug!(
                organization_id = %scope.organization_id,
                "No admins to alert, skipping critical anomaly notifications"
            );
            return DispatchOutcome::default();
        }

        let mut created = 0;
        for result in critical {
            let notification = build_notification(scope, result);
            match self
                .store
                .insert_notification(scope.organization_id, &notification)
                .await
            {
                Ok(()) => created += 1,
                Err(e) => error!(
                    organization_id = %scope.organization_id,
                    anomaly_type = %result.anomaly_type,
                    error = %e,
                    "Failed to write anomaly notification"
                ),
            }
        }

        info!(
            organization_id = %scope.organization_id,
            notifications = created,
            recipients = recipients.len(),
            "Dispatched critical anomaly alerts"
        );

        DispatchOutcome {
            notifications_created: created,
            recipients: recipients.len(),
        }
    }
}

pub fn build_notification(scope: &AnomalyScope, result: &AnomalyResult) -> CreateNotification {
    CreateNotification {
        notification_type: ANOMALY_NOTIFICATION_TYPE.to_string(),
        title: title_for(result.anomaly_type).to_string(),
        message: message_for(result),
        severity: result.severity,
        metadata: json!({
            "anomaly": result,
            "locationId": scope.location_id,
        }),
    }
}

fn title_for(anomaly_type: AnomalyType) -> &'static str {
    match anomaly_type {
        AnomalyType::RevenueDrop => "Revenue Drop Detected",
        AnomalyType::CancellationSpike => "Cancellation Spike Detected",
        AnomalyType::NoShowSurge => "No-Show Surge Detected",
        AnomalyType::BookingDrop => "Booking Drop Detected",
    }
}

fn message_for(result: &AnomalyResult) -> String {
    let magnitude = result.deviation_percent.unsigned_abs();
    match result.anomaly_type {
        AnomalyType::RevenueDrop => format!(
            "Revenue is down {}% compared to the same day last week (${:.2} vs ${:.2}).",
            magnitude, result.metric_value, result.expected_value
        ),
        AnomalyType::CancellationSpike => format!(
            "Cancellation rate is {:.1}% today, {}% above the 30-day average of {:.1}%.",
            result.metric_value, magnitude, result.expected_value
        ),
        AnomalyType::NoShowSurge => format!(
            "{} clients did not show up for their appointments today.",
            result.metric_value as i64
        ),
        AnomalyType::BookingDrop => format!(
            "New bookings are down {}% versus the 4-week average ({} vs {:.1}).",
            magnitude, result.metric_value as i64, result.expected_value
        ),
    }
}

#[cfg(test)]
mod tests {
    use db::models::anomaly::AnomalySeverity;
    use uuid::Uuid;

    use super::*;
    use crate::services::anomaly::memory::{FailurePlan, InMemoryAnomalyStore};

    fn result(anomaly_type: AnomalyType, severity: AnomalySeverity) -> AnomalyResult {
        AnomalyResult {
            anomaly_type,
            severity,
            metric_value: 400.0,
            expected_value: 1000.0,
            deviation_percent: -60,
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn only_critical_results_are_dispatched() {
        let org = Uuid::new_v4();
        let store = Arc::new(InMemoryAnomalyStore::new());
        store.add_member(org, Uuid::new_v4(), "admin");
        store.add_member(org, Uuid::new_v4(), "manager");
        store.add_member(org, Uuid::new_v4(), "stylist");
        let dispatcher = AlertDispatcher::new(store.clone());

        let outcome = dispatcher
            .dispatch(
                &AnomalyScope::organization(org),
                &[
                    result(AnomalyType::RevenueDrop, AnomalySeverity::Critical),
                    result(AnomalyType::BookingDrop, AnomalySeverity::Warning),
                ],
            )
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome {
                notifications_created: 1,
                recipients: 2
            }
        );
        let notifications = store.notifications();
        assert_eq!(notifications.len(), 1);
        let sent = &notifications[0].notification;
        assert_eq!(sent.title, "Revenue Drop Detected");
        assert_eq!(sent.notification_type, ANOMALY_NOTIFICATION_TYPE);
        assert!(sent.message.contains("down 60%"));
        assert_eq!(sent.metadata["anomaly"]["type"], "revenue_drop");
    }

    #[tokio::test]
    async fn no_admins_is_a_silent_noop() {
        let org = Uuid::new_v4();
        let store = Arc::new(InMemoryAnomalyStore::new());
        store.add_member(org, Uuid::new_v4(), "stylist");
        let dispatcher = AlertDispatcher::new(store.clone());

        let outcome = dispatcher
            .dispatch(
                &AnomalyScope::organization(org),
                &[result(AnomalyType::NoShowSurge, AnomalySeverity::Critical)],
            )
            .await;

        assert_eq!(outcome, DispatchOutcome::default());
        assert!(store.notifications().is_empty());
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let org = Uuid::new_v4();
        let store = Arc::new(InMemoryAnomalyStore::new());
        store.add_member(org, Uuid::new_v4(), "owner");
        store.set_failures(FailurePlan {
            notification_insert: true,
            ..Default::default()
        });
        let dispatcher = AlertDispatcher::new(store.clone());

        let outcome = dispatcher
            .dispatch(
                &AnomalyScope::organization(org),
                &[result(AnomalyType::CancellationSpike, AnomalySeverity::Critical)],
            )
            .await;

        assert_eq!(outcome.notifications_created, 0);
        assert_eq!(outcome.recipients, 1);
    }

    #[test]
    fn messages_describe_each_type() {
        let scope = AnomalyScope::organization(Uuid::new_v4());
        let mut no_show = result(AnomalyType::NoShowSurge, AnomalySeverity::Critical);
        no_show.metric_value = 5.0;
        assert_eq!(
            build_notification(&scope, &no_show).message,
            "5 clients did not show up for their appointments today."
        );

        let booking = result(AnomalyType::BookingDrop, AnomalySeverity::Critical);
        assert_eq!(build_notification(&scope, &booking).title, "Booking Drop Detected");
    }
}
