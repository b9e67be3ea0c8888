use crate::domain::receivables::ReceivableItem;
use crate::domain::types::ContractId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /receivables/recalculate`.
///
/// `contract_id` is optional at the JSON level so that a missing field is
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateRequest {
    #[serde(default)]
    pub contract_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateResponse {
    pub success: bool,
    pub deleted_count: u64,
    pub generated_count: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReceivablesResponse {
    pub contract_id: ContractId,
    pub items: Vec<ReceivableItem>,
    pub total_expected: Decimal,
    pub total_outstanding: Decimal,
}

impl ContractReceivablesResponse {
    pub fn new(contract_id: ContractId, items: Vec<ReceivableItem>) -> Self {
        let total_expected = items.iter().map(|item| item.expected_amount).sum();
        let total_outstanding = items.iter().map(ReceivableItem::outstanding).sum();
        Self {
            contract_id,
            items,
            total_expected,
            total_outstanding,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}
