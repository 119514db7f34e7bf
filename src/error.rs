use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Everything a route can fail with, mapped onto the portal's response
/// taxonomy. Storage raises these directly so the status survives the trip
/// through the route boundary.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PortalError>;

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = match self {
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Io(_) | PortalError::Json(_) | PortalError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Internal failures are logged server-side and never echoed back.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self);
            return (status, Json(json!({ "message": "Server Error" }))).into_response();
        }

        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: PortalError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(
            status_of(PortalError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PortalError::Unauthorized("You must be logged in!")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(PortalError::Forbidden("User not authorized")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(PortalError::NotFound("Branch")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(PortalError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(PortalError::NotFound("Subject").to_string(), "Subject not found");
    }
}
