use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

pub struct DailySalesSummary;

impl DailySalesSummary {
    /// Total revenue for a day. Without a location this sums every location of
    /// the organization. Returns `None` when no summary rows exist for the day.
    pub async fn total_revenue(
        pool: &PgPool,
        organization_id: Uuid,
        location_id: Option<Uuid>,
        date: NaiveDate,
    ) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<f64>>(
            r#"SELECT SUM(total_revenue)::float8
            FROM daily_sales_summary
            WHERE organization_id = $1
              AND ($2::uuid IS NULL OR location_id = $2)
              AND summary_date = $3"#,
        )
        .bind(organization_id)
        .bind(location_id)
        .bind(date)
        .fetch_one(pool)
        .await
    }
}
