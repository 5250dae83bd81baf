//! JSON error responses for the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::error::PolydashError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &PolydashError) -> StatusCode {
    match err {
        PolydashError::Validation { .. } => StatusCode::BAD_REQUEST,
        PolydashError::NotFound { .. } => StatusCode::NOT_FOUND,
        PolydashError::LimitExceeded { .. } | PolydashError::OrderRejected { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PolydashError::PositionClosed { .. } => StatusCode::CONFLICT,
        PolydashError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PolydashError::Store { .. }
        | PolydashError::Io(_)
        | PolydashError::ConfigParse { .. }
        | PolydashError::ConfigMissing { .. }
        | PolydashError::ConfigInvalid { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PolydashError> for WebError {
    fn from(err: PolydashError) -> Self {
        Self::new(status_from_error(&err), err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "detail": self.message }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_status_codes() {
        let cases = [
            (PolydashError::validation("bad"), StatusCode::BAD_REQUEST),
            (PolydashError::market_not_found("m"), StatusCode::NOT_FOUND),
            (
                PolydashError::LimitExceeded { size: 2.0, max: 1.0 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (PolydashError::PositionClosed { id: 1 }, StatusCode::CONFLICT),
            (
                PolydashError::OrderRejected { reason: "no".into() },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PolydashError::upstream("gamma", "timeout"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PolydashError::Store { reason: "disk".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(status_from_error(&err), status, "{err}");
        }
    }

    #[test]
    fn web_error_keeps_message() {
        let err = WebError::from(PolydashError::market_not_found("demo_market_9"));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "market not found: demo_market_9");
    }
}
