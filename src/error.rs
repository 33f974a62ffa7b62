use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::domain::Parameter;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce `{"error": ..., "code": ...}`
/// bodies. Internal detail is logged, never returned to the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Body is not a non-empty JSON object.
    #[error("Invalid JSON data")]
    InvalidJson,

    /// A known parameter could not be coerced to a finite number.
    #[error("Invalid value for {0}")]
    InvalidValue(Parameter),

    #[error("Invalid interval. Use '6hr' or '12hr'.")]
    InvalidInterval(String),

    /// `/predict` called before any `/update`.
    #[error("No real-time data available for prediction.")]
    NoData,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidJson => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
            AppError::InvalidValue(_) => (StatusCode::BAD_REQUEST, "INVALID_VALUE"),
            AppError::InvalidInterval(interval) => {
                tracing::debug!(%interval, "Rejected projection interval");
                (StatusCode::BAD_REQUEST, "INVALID_INTERVAL")
            }
            AppError::NoData => (StatusCode::BAD_REQUEST, "NO_DATA"),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                let body = json!({
                    "error": "An internal error occurred",
                    "code": "INTERNAL_ERROR",
                });
                return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
            }
        };

        let body = json!({
            "error": self.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn client_errors_carry_message_and_code() {
        let (status, body) = render(AppError::InvalidValue(Parameter::Ph)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid value for PH", "code": "INVALID_VALUE"}));

        let (status, body) = render(AppError::NoData).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NO_DATA");
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let (status, body) = render(AppError::Internal("lock poisoned at 0xdead".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"error": "An internal error occurred", "code": "INTERNAL_ERROR"})
        );
    }
}
