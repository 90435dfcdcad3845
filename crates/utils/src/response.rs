use serde::Serialize;
use ts_rs::TS;

/// Envelope shared by the dashboard-facing JSON routes. Failures use the
/// `{ error }` body instead.
#[derive(Debug, Serialize, TS)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_serializes_with_data() {
        let response = ApiResponse::success(vec![1, 2]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": [1, 2] }));
    }
}
