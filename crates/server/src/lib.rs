use std::sync::Arc;

use axum::Router;
use services::services::{anomaly::AnomalyDetector, payroll::PayrollService};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod routes;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub detector: AnomalyDetector,
    /// `None` when no payroll provider is configured
    pub payroll: Option<Arc<PayrollService>>,
}

/// Full application router. CORS is wide open: the endpoints are called
/// directly from browser sessions on any tenant domain.
pub fn app(state: AppState) -> Router {
    routes::router(&state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
