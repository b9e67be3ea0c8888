use crate::api::types::HealthCheckResponse;
use crate::server::AppState;
use axum::{extract::State, Json};

/// Liveness check
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        service: state.config.service.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
