//! In-memory [`AnomalyStore`] used by tests across the workspace.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use db::models::{
    anomaly::{Anomaly, AnomalyResult},
    appointment::AppointmentCounts,
    notification::CreateNotification,
};
use sqlx::types::Json;
use uuid::Uuid;

use super::store::{ALERT_RECIPIENT_ROLES, AnomalyScope, AnomalyStore};

#[derive(Debug, Clone)]
pub struct SalesRow {
    pub organization_id: Uuid,
    pub location_id: Option<Uuid>,
    pub date: NaiveDate,
    pub revenue: f64,
}

#[derive(Debug, Clone)]
pub struct AppointmentRow {
    pub organization_id: Uuid,
    pub location_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct StoredNotification {
    pub organization_id: Uuid,
    pub notification: CreateNotification,
}

#[derive(Default)]
struct Tables {
    organizations: Vec<Uuid>,
    sales: Vec<SalesRow>,
    appointments: Vec<AppointmentRow>,
    members: Vec<MemberRow>,
    anomalies: Vec<Anomaly>,
    notifications: Vec<StoredNotification>,
}

/// Failure switches for exercising error paths
#[derive(Debug, Default, Clone, Copy)]
pub struct FailurePlan {
    pub reads: bool,
    pub anomaly_insert: bool,
    pub notification_insert: bool,
}

#[derive(Default)]
pub struct InMemoryAnomalyStore {
    tables: Mutex<Tables>,
    failures: Mutex<FailurePlan>,
}

fn in_scope(scope: &AnomalyScope, organization_id: Uuid, location_id: Option<Uuid>) -> bool {
    organization_id == scope.organization_id
        && scope.location_id.is_none_or(|loc| location_id == Some(loc))
}

fn injected(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected {what} failure"))
}

impl InMemoryAnomalyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failures(&self, plan: FailurePlan) {
        *self.failures.lock().unwrap() = plan;
    }

    pub fn add_organization(&self, organization_id: Uuid) {
        self.tables.lock().unwrap().organizations.push(organization_id);
    }

    pub fn add_sales(&self, row: SalesRow) {
        self.tables.lock().unwrap().sales.push(row);
    }

    /// Add `count` appointments with the same shape
    pub fn add_appointments(&self, row: AppointmentRow, count: usize) {
        let mut tables = self.tables.lock().unwrap();
        tables
            .appointments
            .extend(std::iter::repeat_n(row, count));
    }

    pub fn add_member(&self, organization_id: Uuid, user_id: Uuid, role: &str) {
        self.tables.lock().unwrap().members.push(MemberRow {
            organization_id,
            user_id,
            role: role.to_string(),
        });
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.tables.lock().unwrap().anomalies.clone()
    }

    pub fn notifications(&self) -> Vec<StoredNotification> {
        self.tables.lock().unwrap().notifications.clone()
    }

    fn failures(&self) -> FailurePlan {
        *self.failures.lock().unwrap()
    }
}

#[async_trait]
impl AnomalyStore for InMemoryAnomalyStore {
    async fn total_revenue(
        &self,
        scope: &AnomalyScope,
        date: NaiveDate,
    ) -> Result<Option<f64>, sqlx::Error> {
        if self.failures().reads {
            return Err(injected("read"));
        }
        let tables = self.tables.lock().unwrap();
        let rows: Vec<f64> = tables
            .sales
            .iter()
            .filter(|r| r.date == date && in_scope(scope, r.organization_id, r.location_id))
            .map(|r| r.revenue)
            .collect();
        Ok((!rows.is_empty()).then(|| rows.iter().sum()))
    }

    async fn appointment_counts(
        &self,
        scope: &AnomalyScope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AppointmentCounts, sqlx::Error> {
        if self.failures().reads {
            return Err(injected("read"));
        }
        let tables = self.tables.lock().unwrap();
        let mut counts = AppointmentCounts::default();
        for row in tables.appointments.iter().filter(|r| {
            r.appointment_date >= from
                && r.appointment_date < to
                && in_scope(scope, r.organization_id, r.location_id)
        }) {
            counts.total += 1;
            match row.status.as_str() {
                "cancelled" => counts.cancelled += 1,
                "no_show" => counts.no_show += 1,
                _ => {}
            }
        }
        Ok(counts)
    }

    async fn bookings_created(
        &self,
        scope: &AnomalyScope,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        if self.failures().reads {
            return Err(injected("read"));
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .appointments
            .iter()
            .filter(|r| {
                r.created_at >= from
                    && r.created_at < to
                    && in_scope(scope, r.organization_id, r.location_id)
            })
            .count() as i64)
    }

    async fn insert_anomalies(
        &self,
        scope: &AnomalyScope,
        results: &[AnomalyResult],
    ) -> Result<u64, sqlx::Error> {
        if self.failures().anomaly_insert {
            return Err(injected("anomaly insert"));
        }
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        tables.anomalies.extend(results.iter().map(|r| Anomaly {
            id: Uuid::new_v4(),
            organization_id: scope.organization_id,
            location_id: scope.location_id,
            anomaly_type: r.anomaly_type,
            severity: r.severity,
            metric_value: r.metric_value,
            expected_value: r.expected_value,
            deviation_percent: r.deviation_percent,
            context: Json(r.context.clone()),
            created_at: now,
        }));
        Ok(results.len() as u64)
    }

    async fn recent_anomalies(
        &self,
        scope: &AnomalyScope,
        limit: i64,
    ) -> Result<Vec<Anomaly>, sqlx::Error> {
        if self.failures().reads {
            return Err(injected("read"));
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .anomalies
            .iter()
            .rev()
            .filter(|a| in_scope(scope, a.organization_id, a.location_id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn alert_recipients(&self, organization_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        if self.failures().reads {
            return Err(injected("read"));
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .members
            .iter()
            .filter(|m| {
                m.organization_id == organization_id
                    && ALERT_RECIPIENT_ROLES.contains(&m.role.as_str())
            })
            .map(|m| m.user_id)
            .collect())
    }

    async fn insert_notification(
        &self,
        organization_id: Uuid,
        notification: &CreateNotification,
    ) -> Result<(), sqlx::Error> {
        if self.failures().notification_insert {
            return Err(injected("notification insert"));
        }
        self.tables
            .lock()
            .unwrap()
            .notifications
            .push(StoredNotification {
                organization_id,
                notification: notification.clone(),
            });
        Ok(())
    }

    async fn organization_ids(&self) -> Result<Vec<Uuid>, sqlx::Error> {
        if self.failures().reads {
            return Err(injected("read"));
        }
        Ok(self.tables.lock().unwrap().organizations.clone())
    }
}
