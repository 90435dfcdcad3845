use axum::{Router, response::Json, routing::get};
use serde_json::{Value, json};

use crate::AppState;

pub mod anomalies;
pub mod payroll;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(anomalies::router(state))
        .merge(payroll::router(state))
}
