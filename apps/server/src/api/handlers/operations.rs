//! FHIR operation handlers
//!
//! Operations are invoked as `POST [base]/{type}/${operation}` with a
//! Parameters resource body. Responses are always `application/fhir+json`.

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value as JsonValue;

use crate::{state::AppState, Error, Result};

/// Type-level operation: POST [base]/{type}/$operation
pub async fn operation_type(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource_type, operation)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response> {
    let operation = operation.strip_prefix('$').ok_or_else(|| {
        Error::Validation(format!("Unknown endpoint: {resource_type}/{operation}"))
    })?;

    let principal = state.auth.authenticate(&headers)?;
    let params = crate::models::Parameters::from_slice(&body)?;

    match (resource_type.as_str(), operation) {
        ("CodeSystem", "import") => {
            let out = state.import.import(&principal, &params).await?;
            let payload = serde_json::to_value(out)
                .map_err(|e| Error::Internal(format!("Failed to serialize Parameters: {e}")))?;
            fhir_json_response(StatusCode::OK, &payload)
        }
        _ => Err(Error::Validation(format!(
            "Operation ${operation} is not supported on {resource_type}"
        ))),
    }
}

fn fhir_json_response(status: StatusCode, payload: &JsonValue) -> Result<Response> {
    let body = serde_json::to_vec(payload)
        .map_err(|e| Error::Internal(format!("Failed to serialize response: {e}")))?;

    let mut response = (status, Body::from(body)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/fhir+json; charset=utf-8"),
    );
    Ok(response)
}
