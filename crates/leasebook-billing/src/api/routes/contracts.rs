//! Read-only views of a contract's ledger

use crate::api::error::Result;
use crate::api::types::ContractReceivablesResponse;
use crate::domain::reconciler::SchedulePreview;
use crate::domain::types::ContractId;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

pub async fn list_contract_receivables(
    State(state): State<AppState>,
    Path(contract_id): Path<String>,
) -> Result<Json<ContractReceivablesResponse>> {
    let contract_id = ContractId::parse(&contract_id)?;
    debug!("Listing receivables for contract {}", contract_id);

    let items = state.receivables.list_items(&contract_id).await?;
    Ok(Json(ContractReceivablesResponse::new(contract_id, items)))
}

/// Schedule a recalculation would produce, without writing it
pub async fn preview_contract_schedule(
    State(state): State<AppState>,
    Path(contract_id): Path<String>,
) -> Result<Json<SchedulePreview>> {
    let contract_id = ContractId::parse(&contract_id)?;
    debug!("Previewing schedule for contract {}", contract_id);

    let preview = state.reconciler.preview(&contract_id).await?;
    Ok(Json(preview))
}
