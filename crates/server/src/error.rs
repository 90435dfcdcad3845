use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use services::services::{anomaly::AnomalyError, payroll::PayrollError};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Anomaly(#[from] AnomalyError),
    #[error(transparent)]
    Payroll(#[from] PayrollError),
    #[error("payroll integration is not configured")]
    PayrollDisabled,
}

/// Error body for every route
#[derive(Debug, Serialize, TS)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Anomaly(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::PayrollDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Payroll(e) => match e {
                PayrollError::InvalidRequest(_)
                | PayrollError::UnknownProvider(_)
                | PayrollError::ProviderNotConfigured(_)
                | PayrollError::Unsupported { .. } => StatusCode::BAD_REQUEST,
                PayrollError::NotConnected => StatusCode::NOT_FOUND,
                e if e.is_upstream() => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payroll_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(PayrollError::NotConnected).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PayrollError::InvalidRequest("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PayrollError::Http {
                status: 500,
                body: String::new()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(PayrollError::Database(sqlx_error())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anomaly_errors_are_internal() {
        let err = ApiError::from(AnomalyError::Database(sqlx_error()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("database error"));
    }

    fn sqlx_error() -> sqlx::Error {
        sqlx::Error::PoolTimedOut
    }
}
