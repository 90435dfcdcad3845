//! Routes for anomaly detection.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::Utc;
use db::models::anomaly::Anomaly;
use serde::Deserialize;
use services::services::anomaly::{AnomalyError, AnomalyScope, DetectionSummary};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// Body accepted by the detection endpoints. Fields are optional here so a
/// missing organization is reported as a 400 with a readable message.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DetectAnomaliesRequest {
    pub organization_id: Option<String>,
    pub location_id: Option<String>,
}

impl DetectAnomaliesRequest {
    fn scope(&self) -> Result<AnomalyScope, ApiError> {
        let organization_id = self
            .organization_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("organizationId is required".to_string()))?;

        Ok(AnomalyScope {
            organization_id: parse_id("organizationId", organization_id)?,
            location_id: self
                .location_id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
                .map(|id| parse_id("locationId", id))
                .transpose()?,
        })
    }
}

fn parse_id(field: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest(format!("{field} must be a UUID")))
}

/// POST /functions/v1/detect-anomalies
/// Run every anomaly check, persist what was found and alert admins on
/// critical results
pub async fn detect_anomalies(
    State(state): State<AppState>,
    payload: Result<Json<DetectAnomaliesRequest>, JsonRejection>,
) -> Result<ResponseJson<DetectionSummary>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e.body_text())))?;
    let scope = request.scope()?;

    let summary = state.detector.run(&scope, Utc::now()).await?;
    Ok(ResponseJson(summary))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAnomaliesQuery {
    pub location_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// GET /api/organizations/{organization_id}/anomalies
/// Most recent stored anomalies, newest first
pub async fn list_anomalies(
    State(state): State<AppState>,
    organization_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListAnomaliesQuery>, QueryRejection>,
) -> Result<ResponseJson<ApiResponse<Vec<Anomaly>>>, ApiError> {
    let Path(organization_id) = organization_id
        .map_err(|_| ApiError::BadRequest("organizationId must be a UUID".to_string()))?;
    let Query(query) =
        query.map_err(|e| ApiError::BadRequest(format!("invalid query: {}", e.body_text())))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let scope = AnomalyScope {
        organization_id,
        location_id: query.location_id,
    };

    let anomalies = state
        .detector
        .store()
        .recent_anomalies(&scope, limit)
        .await
        .map_err(AnomalyError::from)?;
    Ok(ResponseJson(ApiResponse::success(anomalies)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/functions/v1/detect-anomalies", post(detect_anomalies))
        .route("/api/anomalies/detect", post(detect_anomalies))
        .route(
            "/api/organizations/{organization_id}/anomalies",
            get(list_anomalies),
        )
}
