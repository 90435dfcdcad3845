use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Type, types::Json};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Which check produced an anomaly
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "anomaly_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnomalyType {
    RevenueDrop,
    CancellationSpike,
    NoShowSurge,
    BookingDrop,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    TS,
    EnumString,
    Display,
)]
#[sqlx(type_name = "anomaly_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnomalySeverity {
    Info,
    Warning,
    Critical,
}

/// A single detected anomaly, as returned to callers and embedded in
/// notification metadata. Only exists when a check crossed its threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyResult {
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub metric_value: f64,
    pub expected_value: f64,
    pub deviation_percent: i32,
    pub context: Value,
}

impl AnomalyResult {
    pub fn is_critical(&self) -> bool {
        self.severity == AnomalySeverity::Critical
    }
}

/// Persisted anomaly row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub location_id: Option<Uuid>,
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub metric_value: f64,
    pub expected_value: f64,
    pub deviation_percent: i32,
    #[ts(type = "Record<string, unknown>")]
    pub context: Json<Value>,
    pub created_at: DateTime<Utc>,
}

impl Anomaly {
    /// Insert one row per result in a single statement. There is no
    /// uniqueness key, so repeated calls for the same day insert duplicates.
    pub async fn create_many(
        pool: &PgPool,
        organization_id: Uuid,
        location_id: Option<Uuid>,
        results: &[AnomalyResult],
    ) -> Result<u64, sqlx::Error> {
        if results.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO anomalies (organization_id, location_id, anomaly_type, severity, \
             metric_value, expected_value, deviation_percent, context) ",
        );
        builder.push_values(results, |mut row, result| {
            row.push_bind(organization_id)
                .push_bind(location_id)
                .push_bind(result.anomaly_type)
                .push_bind(result.severity)
                .push_bind(result.metric_value)
                .push_bind(result.expected_value)
                .push_bind(result.deviation_percent)
                .push_bind(Json(result.context.clone()));
        });

        let done = builder.build().execute(pool).await?;
        Ok(done.rows_affected())
    }

    pub async fn find_recent(
        pool: &PgPool,
        organization_id: Uuid,
        location_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Anomaly>(
            r#"SELECT id, organization_id, location_id, anomaly_type, severity,
                      metric_value, expected_value, deviation_percent, context, created_at
               FROM anomalies
               WHERE organization_id = $1
                 AND ($2::uuid IS NULL OR location_id = $2)
               ORDER BY created_at DESC
               LIMIT $3"#,
        )
        .bind(organization_id)
        .bind(location_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn result_serializes_with_camel_case_and_type_tag() {
        let result = AnomalyResult {
            anomaly_type: AnomalyType::NoShowSurge,
            severity: AnomalySeverity::Warning,
            metric_value: 3.0,
            expected_value: 1.0,
            deviation_percent: 200,
            context: json!({ "date": "2026-03-02" }),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "no_show_surge");
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["metricValue"], 3.0);
        assert_eq!(value["deviationPercent"], 200);
        assert!(!result.is_critical());
    }

    #[test]
    fn anomaly_type_parses_from_storage_names() {
        assert_eq!(
            AnomalyType::from_str("cancellation_spike").unwrap(),
            AnomalyType::CancellationSpike
        );
        assert_eq!(AnomalyType::BookingDrop.to_string(), "booking_drop");
        assert!(AnomalySeverity::Critical > AnomalySeverity::Warning);
    }
}
