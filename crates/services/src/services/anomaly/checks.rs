//! The four anomaly checks. Each `check_*` fetches its inputs from the store
//! and hands them to a pure `evaluate_*` function that applies the thresholds.
//! A `None` result means nothing crossed a threshold (or there was not enough
//! data to tell), never a zero deviation.

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use db::models::{
    anomaly::{AnomalyResult, AnomalySeverity, AnomalyType},
    appointment::AppointmentCounts,
};
use serde_json::json;

use super::store::{AnomalyScope, AnomalyStore};

/// Revenue below last week by more than this percent is a warning
pub const REVENUE_WARNING_DEVIATION: f64 = -25.0;
pub const REVENUE_CRITICAL_DEVIATION: f64 = -50.0;

/// Trailing window for the historical cancellation rate
pub const CANCELLATION_HISTORY_DAYS: i64 = 30;
pub const CANCELLATION_MIN_HISTORY: i64 = 50;
pub const CANCELLATION_MIN_TODAY: i64 = 3;
pub const CANCELLATION_WARNING_MULTIPLIER: i64 = 2;
pub const CANCELLATION_CRITICAL_MULTIPLIER: i64 = 3;

pub const NO_SHOW_BASELINE: i64 = 1;
pub const NO_SHOW_WARNING_COUNT: i64 = 3;
pub const NO_SHOW_CRITICAL_COUNT: i64 = 5;

pub const BOOKING_BASELINE_WEEKS: i64 = 4;
pub const BOOKING_MIN_BASELINE: f64 = 5.0;
pub const BOOKING_WARNING_DEVIATION: f64 = -40.0;
pub const BOOKING_CRITICAL_DEVIATION: f64 = -60.0;

fn deviation_percent(actual: f64, expected: f64) -> f64 {
    (actual - expected) / expected * 100.0
}

fn percent(part: i64, whole: i64) -> f64 {
    (part as f64 * 100.0) / whole as f64
}

pub fn evaluate_revenue(
    today: NaiveDate,
    today_revenue: f64,
    comparison_date: NaiveDate,
    last_week_revenue: f64,
) -> Option<AnomalyResult> {
    if last_week_revenue == 0.0 {
        return None;
    }

    let deviation = deviation_percent(today_revenue, last_week_revenue);
    if deviation >= REVENUE_WARNING_DEVIATION {
        return None;
    }

    let severity = if deviation < REVENUE_CRITICAL_DEVIATION {
        AnomalySeverity::Critical
    } else {
        AnomalySeverity::Warning
    };

    Some(AnomalyResult {
        anomaly_type: AnomalyType::RevenueDrop,
        severity,
        metric_value: today_revenue,
        expected_value: last_week_revenue,
        deviation_percent: deviation.round() as i32,
        context: json!({
            "date": today.to_string(),
            "comparisonDate": comparison_date.to_string(),
        }),
    })
}

pub fn evaluate_cancellations(
    today: AppointmentCounts,
    history: AppointmentCounts,
) -> Option<AnomalyResult> {
    if today.total == 0 || history.total < CANCELLATION_MIN_HISTORY || history.cancelled == 0 {
        return None;
    }

    // Rate comparisons are cross-multiplied so thresholds are exact:
    // c_t / t_t > k * c_h / t_h  <=>  c_t * t_h > k * c_h * t_t
    let exceeds = |multiplier: i64| {
        today.cancelled * history.total > multiplier * history.cancelled * today.total
    };

    if !exceeds(CANCELLATION_WARNING_MULTIPLIER) || today.cancelled < CANCELLATION_MIN_TODAY {
        return None;
    }

    let severity = if exceeds(CANCELLATION_CRITICAL_MULTIPLIER) {
        AnomalySeverity::Critical
    } else {
        AnomalySeverity::Warning
    };

    let today_rate = percent(today.cancelled, today.total);
    let historical_rate = percent(history.cancelled, history.total);

    Some(AnomalyResult {
        anomaly_type: AnomalyType::CancellationSpike,
        severity,
        metric_value: today_rate,
        expected_value: historical_rate,
        deviation_percent: deviation_percent(today_rate, historical_rate).round() as i32,
        context: json!({
            "cancellations": today.cancelled,
            "totalAppointments": today.total,
            "historicalAppointments": history.total,
            "historicalCancellations": history.cancelled,
        }),
    })
}

pub fn evaluate_no_shows(today: NaiveDate, no_shows: i64) -> Option<AnomalyResult> {
    if no_shows < NO_SHOW_WARNING_COUNT {
        return None;
    }

    let severity = if no_shows >= NO_SHOW_CRITICAL_COUNT {
        AnomalySeverity::Critical
    } else {
        AnomalySeverity::Warning
    };

    Some(AnomalyResult {
        anomaly_type: AnomalyType::NoShowSurge,
        severity,
        metric_value: no_shows as f64,
        expected_value: NO_SHOW_BASELINE as f64,
        deviation_percent: ((no_shows - NO_SHOW_BASELINE) * 100 / NO_SHOW_BASELINE) as i32,
        context: json!({ "date": today.to_string() }),
    })
}

/// `weekly_counts` are the bookings created on the same weekday in each of the
/// preceding weeks.
pub fn evaluate_bookings(today_count: i64, weekly_counts: &[i64]) -> Option<AnomalyResult> {
    if weekly_counts.is_empty() {
        return None;
    }

    let baseline = weekly_counts.iter().sum::<i64>() as f64 / weekly_counts.len() as f64;
    if baseline == 0.0 || baseline < BOOKING_MIN_BASELINE {
        return None;
    }

    let deviation = deviation_percent(today_count as f64, baseline);
    if deviation >= BOOKING_WARNING_DEVIATION {
        return None;
    }

    let severity = if deviation < BOOKING_CRITICAL_DEVIATION {
        AnomalySeverity::Critical
    } else {
        AnomalySeverity::Warning
    };

    Some(AnomalyResult {
        anomaly_type: AnomalyType::BookingDrop,
        severity,
        metric_value: today_count as f64,
        expected_value: baseline,
        deviation_percent: deviation.round() as i32,
        context: json!({ "weeklyCounts": weekly_counts }),
    })
}

pub async fn check_revenue(
    store: &dyn AnomalyStore,
    scope: &AnomalyScope,
    today: NaiveDate,
) -> Result<Option<AnomalyResult>, sqlx::Error> {
    let comparison_date = today - TimeDelta::weeks(1);

    let Some(today_revenue) = store.total_revenue(scope, today).await? else {
        return Ok(None);
    };
    let Some(last_week_revenue) = store.total_revenue(scope, comparison_date).await? else {
        return Ok(None);
    };

    Ok(evaluate_revenue(
        today,
        today_revenue,
        comparison_date,
        last_week_revenue,
    ))
}

pub async fn check_cancellations(
    store: &dyn AnomalyStore,
    scope: &AnomalyScope,
    today: NaiveDate,
) -> Result<Option<AnomalyResult>, sqlx::Error> {
    let tomorrow = today + TimeDelta::days(1);
    let today_counts = store.appointment_counts(scope, today, tomorrow).await?;
    if today_counts.total == 0 {
        return Ok(None);
    }

    let history_start = today - TimeDelta::days(CANCELLATION_HISTORY_DAYS);
    let history = store.appointment_counts(scope, history_start, today).await?;

    Ok(evaluate_cancellations(today_counts, history))
}

pub async fn check_no_shows(
    store: &dyn AnomalyStore,
    scope: &AnomalyScope,
    today: NaiveDate,
) -> Result<Option<AnomalyResult>, sqlx::Error> {
    let counts = store
        .appointment_counts(scope, today, today + TimeDelta::days(1))
        .await?;
    Ok(evaluate_no_shows(today, counts.no_show))
}

pub async fn check_bookings(
    store: &dyn AnomalyStore,
    scope: &AnomalyScope,
    today: NaiveDate,
) -> Result<Option<AnomalyResult>, sqlx::Error> {
    let today_count = bookings_on(store, scope, today).await?;

    let mut weekly_counts = Vec::with_capacity(BOOKING_BASELINE_WEEKS as usize);
    for week in 1..=BOOKING_BASELINE_WEEKS {
        weekly_counts.push(bookings_on(store, scope, today - TimeDelta::weeks(week)).await?);
    }

    Ok(evaluate_bookings(today_count, &weekly_counts))
}

/// Bookings created during the UTC calendar day `date`
async fn bookings_on(
    store: &dyn AnomalyStore,
    scope: &AnomalyScope,
    date: NaiveDate,
) -> Result<i64, sqlx::Error> {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start + TimeDelta::days(1);
    store.bookings_created(scope, start, end).await
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::services::anomaly::memory::{AppointmentRow, InMemoryAnomalyStore, SalesRow};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn counts(total: i64, cancelled: i64) -> AppointmentCounts {
        AppointmentCounts {
            total,
            cancelled,
            no_show: 0,
        }
    }

    #[test]
    fn revenue_half_of_last_week_is_warning_at_boundary() {
        let today = date(2026, 3, 9);
        let result = evaluate_revenue(today, 500.0, today - TimeDelta::weeks(1), 1000.0).unwrap();
        assert_eq!(result.deviation_percent, -50);
        assert_eq!(result.severity, AnomalySeverity::Warning);
        assert_eq!(result.context["comparisonDate"], "2026-03-02");
    }

    #[test]
    fn revenue_below_half_is_critical() {
        let today = date(2026, 3, 9);
        let result = evaluate_revenue(today, 400.0, today, 1000.0).unwrap();
        assert_eq!(result.deviation_percent, -60);
        assert_eq!(result.severity, AnomalySeverity::Critical);
        assert_eq!(result.metric_value, 400.0);
        assert_eq!(result.expected_value, 1000.0);
    }

    #[test]
    fn revenue_small_drop_or_zero_baseline_is_ignored() {
        let today = date(2026, 3, 9);
        assert!(evaluate_revenue(today, 800.0, today, 1000.0).is_none());
        // exactly -25% is not below the threshold
        assert!(evaluate_revenue(today, 750.0, today, 1000.0).is_none());
        assert!(evaluate_revenue(today, 0.0, today, 0.0).is_none());
        assert!(evaluate_revenue(today, 1200.0, today, 1000.0).is_none());
    }

    #[test]
    fn cancellation_spike_with_three_cancellations_is_warning() {
        let result = evaluate_cancellations(counts(10, 3), counts(60, 6)).unwrap();
        assert_eq!(result.anomaly_type, AnomalyType::CancellationSpike);
        assert_eq!(result.severity, AnomalySeverity::Warning);
        assert_eq!(result.metric_value, 30.0);
        assert_eq!(result.expected_value, 10.0);
        assert_eq!(result.deviation_percent, 200);
    }

    #[test]
    fn cancellation_spike_needs_three_cancellations() {
        assert!(evaluate_cancellations(counts(10, 2), counts(60, 6)).is_none());
    }

    #[test]
    fn cancellation_spike_above_three_times_is_critical() {
        let result = evaluate_cancellations(counts(10, 4), counts(60, 6)).unwrap();
        assert_eq!(result.severity, AnomalySeverity::Critical);
    }

    #[test]
    fn cancellation_requires_enough_history_and_nonzero_baseline() {
        assert!(evaluate_cancellations(counts(10, 5), counts(49, 5)).is_none());
        assert!(evaluate_cancellations(counts(10, 5), counts(60, 0)).is_none());
        assert!(evaluate_cancellations(counts(0, 0), counts(60, 6)).is_none());
    }

    #[test]
    fn no_show_thresholds() {
        let today = date(2026, 3, 9);
        assert!(evaluate_no_shows(today, 2).is_none());

        let warning = evaluate_no_shows(today, 3).unwrap();
        assert_eq!(warning.severity, AnomalySeverity::Warning);
        assert_eq!(warning.deviation_percent, 200);
        assert_eq!(warning.expected_value, 1.0);

        let critical = evaluate_no_shows(today, 5).unwrap();
        assert_eq!(critical.severity, AnomalySeverity::Critical);
        assert_eq!(critical.deviation_percent, 400);
    }

    #[test]
    fn booking_drop_ignores_small_baselines() {
        assert!(evaluate_bookings(0, &[4, 4, 4, 4]).is_none());
        assert!(evaluate_bookings(0, &[0, 0, 0, 0]).is_none());
        assert!(evaluate_bookings(0, &[]).is_none());
    }

    #[test]
    fn booking_drop_severity() {
        let warning = evaluate_bookings(5, &[10, 10, 10, 10]).unwrap();
        assert_eq!(warning.severity, AnomalySeverity::Warning);
        assert_eq!(warning.deviation_percent, -50);
        assert_eq!(warning.expected_value, 10.0);

        let critical = evaluate_bookings(3, &[10, 8, 12, 10]).unwrap();
        assert_eq!(critical.severity, AnomalySeverity::Critical);
        assert_eq!(critical.deviation_percent, -70);

        assert!(evaluate_bookings(7, &[10, 10, 10, 10]).is_none());
    }

    #[tokio::test]
    async fn revenue_check_without_today_row_returns_none() {
        let org = Uuid::new_v4();
        let today = date(2026, 3, 9);
        let store = InMemoryAnomalyStore::new();
        store.add_sales(SalesRow {
            organization_id: org,
            location_id: None,
            date: today - TimeDelta::weeks(1),
            revenue: 1000.0,
        });

        let result = check_revenue(&store, &AnomalyScope::organization(org), today)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn revenue_check_sums_locations_org_wide() {
        let org = Uuid::new_v4();
        let (loc_a, loc_b) = (Uuid::new_v4(), Uuid::new_v4());
        let today = date(2026, 3, 9);
        let store = InMemoryAnomalyStore::new();
        for (loc, day, revenue) in [
            (loc_a, today, 100.0),
            (loc_b, today, 200.0),
            (loc_a, today - TimeDelta::weeks(1), 500.0),
            (loc_b, today - TimeDelta::weeks(1), 500.0),
        ] {
            store.add_sales(SalesRow {
                organization_id: org,
                location_id: Some(loc),
                date: day,
                revenue,
            });
        }

        let org_wide = check_revenue(&store, &AnomalyScope::organization(org), today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org_wide.metric_value, 300.0);
        assert_eq!(org_wide.deviation_percent, -70);

        let single = check_revenue(&store, &AnomalyScope::location(org, loc_b), today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(single.deviation_percent, -60);
    }

    #[tokio::test]
    async fn booking_check_counts_created_day_windows() {
        let org = Uuid::new_v4();
        let today = date(2026, 3, 9);
        let store = InMemoryAnomalyStore::new();
        let row_at = |day: NaiveDate, hour: u32| AppointmentRow {
            organization_id: org,
            location_id: None,
            appointment_date: today + TimeDelta::days(14),
            status: "scheduled".to_string(),
            created_at: Utc
                .from_utc_datetime(&day.and_hms_opt(hour, 0, 0).unwrap()),
        };

        for week in 1..=4 {
            store.add_appointments(row_at(today - TimeDelta::weeks(week), 10), 10);
        }
        store.add_appointments(row_at(today, 23), 2);
        // the day before today is outside every window
        store.add_appointments(row_at(today - TimeDelta::days(1), 12), 30);

        let result = check_bookings(&store, &AnomalyScope::organization(org), today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.metric_value, 2.0);
        assert_eq!(result.expected_value, 10.0);
        assert_eq!(result.severity, AnomalySeverity::Critical);
    }

    #[tokio::test]
    async fn cancellation_check_uses_trailing_thirty_days() {
        let org = Uuid::new_v4();
        let today = date(2026, 3, 9);
        let store = InMemoryAnomalyStore::new();
        let row = |day: NaiveDate, status: &str| AppointmentRow {
            organization_id: org,
            location_id: None,
            appointment_date: day,
            status: status.to_string(),
            created_at: Utc::now(),
        };

        store.add_appointments(row(today, "cancelled"), 3);
        store.add_appointments(row(today, "completed"), 7);
        store.add_appointments(row(today - TimeDelta::days(5), "cancelled"), 6);
        store.add_appointments(row(today - TimeDelta::days(5), "completed"), 54);
        // older than the window, must not dilute the baseline
        store.add_appointments(row(today - TimeDelta::days(31), "completed"), 500);

        let result = check_cancellations(&store, &AnomalyScope::organization(org), today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.severity, AnomalySeverity::Warning);
        assert_eq!(result.context["historicalAppointments"], 60);
    }
}
