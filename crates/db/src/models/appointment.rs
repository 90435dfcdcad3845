use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Status tallies for appointments scheduled within a date range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AppointmentCounts {
    pub total: i64,
    pub cancelled: i64,
    pub no_show: i64,
}

pub struct Appointment;

impl Appointment {
    /// Count appointments whose `appointment_date` falls in `[from, to)`.
    pub async fn status_counts(
        pool: &PgPool,
        organization_id: Uuid,
        location_id: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AppointmentCounts, sqlx::Error> {
        sqlx::query_as::<_, AppointmentCounts>(
            r#"SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled,
                COUNT(*) FILTER (WHERE status = 'no_show') AS no_show
            FROM appointments
            WHERE organization_id = $1
              AND ($2::uuid IS NULL OR location_id = $2)
              AND appointment_date >= $3
              AND appointment_date < $4"#,
        )
        .bind(organization_id)
        .bind(location_id)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await
    }

    /// Count appointments booked (created) in `[from, to)`, regardless of when
    /// they are scheduled for.
    pub async fn count_created_between(
        pool: &PgPool,
        organization_id: Uuid,
        location_id: Option<Uuid>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*)
            FROM appointments
            WHERE organization_id = $1
              AND ($2::uuid IS NULL OR location_id = $2)
              AND created_at >= $3
              AND created_at < $4"#,
        )
        .bind(organization_id)
        .bind(location_id)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await
    }
}
