//! Error types for the terminology server

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CodeSystem not found: {0}")]
    CodeSystemNotFound(String),

    #[error("Multiple CodeSystems found for URL: {0}")]
    AmbiguousCodeSystem(String),

    #[error("Unknown code: {0}")]
    UnknownCode(String),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Error::CodeSystemNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Error::AmbiguousCodeSystem(_)
            | Error::UnknownCode(_)
            | Error::UnknownProperty(_)
            | Error::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "resourceType": "OperationOutcome",
            "issue": [{
                "severity": "error",
                "code": status_to_fhir_code(status),
                "diagnostics": error_message
            }]
        }));

        let mut response = (status, body).into_response();

        // Always emit a FHIR content type for OperationOutcome errors.
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/fhir+json; charset=utf-8"),
        );

        response
    }
}

fn status_to_fhir_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "invalid",
        StatusCode::NOT_FOUND => "not-found",
        StatusCode::UNAUTHORIZED => "login",
        StatusCode::FORBIDDEN => "forbidden",
        _ => "exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_are_stable() {
        assert_eq!(
            Error::UnknownCode("http://ex/cs|X".to_string()).to_string(),
            "Unknown code: http://ex/cs|X"
        );
        assert_eq!(
            Error::UnknownProperty("parent".to_string()).to_string(),
            "Unknown property: parent"
        );
        assert_eq!(
            Error::CodeSystemNotFound("http://ex/cs".to_string()).to_string(),
            "CodeSystem not found: http://ex/cs"
        );
    }
}
