//! API layer - routes and handlers

pub mod handlers;

use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let fhir_router = Router::new()
        // Type-level FHIR operations, e.g. POST /fhir/CodeSystem/$import.
        // The operation segment is captured whole, dollar sign included.
        .route(
            "/:resource_type/:operation",
            post(handlers::operations::operation_type),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root_info))
        .nest("/fhir", fhir_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_check(State(state): State<AppState>) -> crate::Result<impl IntoResponse> {
    state.terminology.ping().await?;
    Ok(Json(json!({
        "status": "ok",
        "service": "vesta"
    })))
}

async fn root_info() -> impl IntoResponse {
    Json(json!({
        "server": "Vesta terminology server",
        "version": env!("CARGO_PKG_VERSION"),
        "fhirVersion": "4.0.1",
        "status": "running"
    }))
}
