//! Reconciliation trigger

use crate::api::error::Result;
use crate::api::types::{RecalculateRequest, RecalculateResponse};
use crate::domain::types::ContractId;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;

/// Regenerate the auto-generated receivables of one contract
pub async fn recalculate_receivables(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RecalculateRequest>, JsonRejection>,
) -> Result<Json<RecalculateResponse>> {
    let Json(request) = payload?;
    let contract_id = ContractId::parse(request.contract_id.as_deref().unwrap_or_default())?;

    info!("Recalculation requested for contract {}", contract_id);
    let summary = state.reconciler.recalculate(&contract_id).await?;

    Ok(Json(RecalculateResponse {
        success: true,
        deleted_count: summary.deleted_count,
        generated_count: summary.generated_count,
        message: summary.message(),
    }))
}
