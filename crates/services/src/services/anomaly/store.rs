use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use db::models::{
    anomaly::{Anomaly, AnomalyResult},
    appointment::{Appointment, AppointmentCounts},
    daily_sales::DailySalesSummary,
    notification::{CreateNotification, Notification},
    organization::{Organization, OrganizationMember},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Roles that receive critical anomaly alerts
pub const ALERT_RECIPIENT_ROLES: &[&str] = &["owner", "admin", "manager"];

/// Tenant scope of a detection run. No location means every location of the
/// organization is aggregated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyScope {
    pub organization_id: Uuid,
    pub location_id: Option<Uuid>,
}

impl AnomalyScope {
    pub fn organization(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            location_id: None,
        }
    }

    pub fn location(organization_id: Uuid, location_id: Uuid) -> Self {
        Self {
            organization_id,
            location_id: Some(location_id),
        }
    }
}

/// Everything the detector reads and writes
#[async_trait]
pub trait AnomalyStore: Send + Sync {
    /// Summed revenue for `date`, `None` when no summary rows exist
    async fn total_revenue(
        &self,
        scope: &AnomalyScope,
        date: NaiveDate,
    ) -> Result<Option<f64>, sqlx::Error>;

    /// Appointment tallies for scheduled dates in `[from, to)`
    async fn appointment_counts(
        &self,
        scope: &AnomalyScope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AppointmentCounts, sqlx::Error>;

    /// Appointments created (booked) in `[from, to)`
    async fn bookings_created(
        &self,
        scope: &AnomalyScope,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>;

    async fn insert_anomalies(
        &self,
        scope: &AnomalyScope,
        results: &[AnomalyResult],
    ) -> Result<u64, sqlx::Error>;

    async fn recent_anomalies(
        &self,
        scope: &AnomalyScope,
        limit: i64,
    ) -> Result<Vec<Anomaly>, sqlx::Error>;

    /// User ids of the members who should see critical alerts
    async fn alert_recipients(&self, organization_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;

    async fn insert_notification(
        &self,
        organization_id: Uuid,
        notification: &CreateNotification,
    ) -> Result<(), sqlx::Error>;

    async fn organization_ids(&self) -> Result<Vec<Uuid>, sqlx::Error>;
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgAnomalyStore {
    pool: PgPool,
}

impl PgAnomalyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnomalyStore for PgAnomalyStore {
    async fn total_revenue(
        &self,
        scope: &AnomalyScope,
        date: NaiveDate,
    ) -> Result<Option<f64>, sqlx::Error> {
        DailySalesSummary::total_revenue(
            &self.pool,
            scope.organization_id,
            scope.location_id,
            date,
        )
        .await
    }

    async fn appointment_counts(
        &self,
        scope: &AnomalyScope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AppointmentCounts, sqlx::Error> {
        Appointment::status_counts(
            &self.pool,
            scope.organization_id,
            scope.location_id,
            from,
            to,
        )
        .await
    }

    async fn bookings_created(
        &self,
        scope: &AnomalyScope,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        Appointment::count_created_between(
            &self.pool,
            scope.organization_id,
            scope.location_id,
            from,
            to,
        )
        .await
    }

    async fn insert_anomalies(
        &self,
        scope: &AnomalyScope,
        results: &[AnomalyResult],
    ) -> Result<u64, sqlx::Error> {
        Anomaly::create_many(
            &self.pool,
            scope.organization_id,
            scope.location_id,
            results,
        )
        .await
    }

    async fn recent_anomalies(
        &self,
        scope: &AnomalyScope,
        limit: i64,
    ) -> Result<Vec<Anomaly>, sqlx::Error> {
        Anomaly::find_recent(&self.pool, scope.organization_id, scope.location_id, limit).await
    }

    async fn alert_recipients(&self, organization_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        OrganizationMember::find_user_ids_by_roles(
            &self.pool,
            organization_id,
            ALERT_RECIPIENT_ROLES,
        )
        .await
    }

    async fn insert_notification(
        &self,
        organization_id: Uuid,
        notification: &CreateNotification,
    ) -> Result<(), sqlx::Error> {
        Notification::create(&self.pool, organization_id, notification).await?;
        Ok(())
    }

    async fn organization_ids(&self) -> Result<Vec<Uuid>, sqlx::Error> {
        Organization::find_all_ids(&self.pool).await
    }
}
