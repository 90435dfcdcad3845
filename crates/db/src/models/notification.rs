use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool, types::Json};
use ts_rs::TS;
use uuid::Uuid;

use super::anomaly::AnomalySeverity;

/// Organization-wide feed entry shown to admins
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub severity: AnomalySeverity,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNotification {
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub severity: AnomalySeverity,
    pub metadata: Value,
}

impl Notification {
    pub async fn create(
        pool: &PgPool,
        organization_id: Uuid,
        data: &CreateNotification,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"INSERT INTO notifications (organization_id, notification_type, title, message, severity, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, organization_id, notification_type, title, message, severity, metadata, created_at"#,
        )
        .bind(organization_id)
        .bind(&data.notification_type)
        .bind(&data.title)
        .bind(&data.message)
        .bind(data.severity)
        .bind(Json(&data.metadata))
        .fetch_one(pool)
        .await
    }
}
