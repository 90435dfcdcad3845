//! Routes for the payroll provider proxy.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::Json as ResponseJson,
    routing::{post, put},
};
use serde::Deserialize;
use serde_json::Value;
use services::services::payroll::{
    ConnectPayroll, PayrollAction, PayrollConnectionInfo, PayrollService,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PayrollProxyRequest {
    pub organization_id: Option<String>,
    pub action: String,
    pub payroll_id: Option<String>,
    pub payload: Option<Value>,
}

fn payroll_service(state: &AppState) -> Result<&Arc<PayrollService>, ApiError> {
    state.payroll.as_ref().ok_or(ApiError::PayrollDisabled)
}

/// POST /api/payroll/proxy
/// Forward one operation to the organization's connected payroll provider
pub async fn proxy_payroll(
    State(state): State<AppState>,
    payload: Result<Json<PayrollProxyRequest>, JsonRejection>,
) -> Result<ResponseJson<Value>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e.body_text())))?;

    let organization_id = request
        .organization_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("organizationId is required".to_string()))?;
    let organization_id = Uuid::parse_str(organization_id.trim())
        .map_err(|_| ApiError::BadRequest("organizationId must be a UUID".to_string()))?;

    let action = PayrollAction::from_parts(&request.action, request.payroll_id, request.payload)?;
    let service = payroll_service(&state)?;

    let response = service.execute(organization_id, action).await?;
    Ok(ResponseJson(response))
}

/// PUT /api/organizations/{organization_id}/payroll/connection
/// Store the tokens obtained from a provider's OAuth consent flow
pub async fn connect_payroll(
    State(state): State<AppState>,
    organization_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ConnectPayroll>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<PayrollConnectionInfo>>, ApiError> {
    let Path(organization_id) = organization_id
        .map_err(|_| ApiError::BadRequest("organizationId must be a UUID".to_string()))?;
    let Json(request) =
        payload.map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e.body_text())))?;
    let service = payroll_service(&state)?;

    let info = service.connect(organization_id, request).await?;
    Ok(ResponseJson(ApiResponse::success(info)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/payroll/proxy", post(proxy_payroll))
        .route(
            "/api/organizations/{organization_id}/payroll/connection",
            put(connect_payroll),
        )
}
