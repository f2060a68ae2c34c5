//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use homeport_domain::error::HubError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`HubError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match &self.0 {
            HubError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            HubError::Argument(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            err @ HubError::NullArgument(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            HubError::NotRunning => (
                StatusCode::SERVICE_UNAVAILABLE,
                "hub is not running".to_string(),
            ),
            err => {
                tracing::error!(error = %err, "hub error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
