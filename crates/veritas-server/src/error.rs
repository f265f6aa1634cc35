//! HTTP error mapping
//!
//! Every failure leaves the server as `{ "error": "<message>" }` with the
//! status of the underlying [`DetectionError`].

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use veritas_core::gateway::ErrorBody;
use veritas_core::DetectionError;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Map a multipart read failure; body-limit overruns become 413
    pub fn from_multipart(err: MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            log::warn!("Rejected upload: {}", err.body_text());
            Self {
                status,
                message: "Upload exceeds the configured size limit".to_string(),
            }
        } else {
            Self::bad_request(format!("Invalid multipart payload: {}", err.body_text()))
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        if err.is_client_error() {
            log::warn!("Request rejected: {}", err);
        } else {
            log::error!("Request failed: {}", err);
        }
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            message: ErrorBody::from(&err).error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_mapping() {
        let err = ApiError::from(DetectionError::NoFramesExtracted("video frames"));
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(DetectionError::ModelLoad("/models/x.onnx missing".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("/models"));

        let err = ApiError::from(DetectionError::ResourceExhausted("gpu".into()));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
