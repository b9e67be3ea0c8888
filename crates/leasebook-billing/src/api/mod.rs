//! HTTP surface of the billing service

pub mod error;
pub mod routes;
pub mod types;

use crate::server::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Routes mounted under `/api/v1`
pub fn routes() -> Router<AppState> {
    Router::new()
        // Reconciliation
        .route(
            "/receivables/recalculate",
            post(routes::receivables::recalculate_receivables),
        )
        // Read-only contract views
        .route(
            "/contracts/:contract_id/receivables",
            get(routes::contracts::list_contract_receivables),
        )
        .route(
            "/contracts/:contract_id/schedule",
            get(routes::contracts::preview_contract_schedule),
        )
}
