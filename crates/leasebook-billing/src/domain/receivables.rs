use crate::domain::contracts::{Contract, RateSnapshot};
use crate::domain::types::{
    BillingMonth, ContractId, ReceivableId, ReceivableStatus, TenantId, UnitId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub const RENT_CATEGORY: &str = "rent";

/// Round a currency amount to cents, half away from zero, always carrying
/// two decimal places
pub fn round_currency(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Expected payment for one billing period of a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivableItem {
    pub id: ReceivableId,
    pub contract_id: ContractId,
    pub unit_id: UnitId,
    pub tenant_id: TenantId,
    pub payment_month: BillingMonth,
    pub expected_amount: Decimal,
    pub amount_paid: Decimal,
    pub status: ReceivableStatus,
    pub due_date: NaiveDate,
    pub category: String,
    /// Set for items produced by the reconciler, clear for manual entries
    pub is_autogenerated: bool,
    pub created_at: DateTime<Utc>,
}

impl ReceivableItem {
    /// Fresh auto-generated rent receivable for `period`, due on its first day
    pub fn scheduled(
        contract: &Contract,
        period: BillingMonth,
        rates: &RateSnapshot,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReceivableId::new(),
            contract_id: contract.id.clone(),
            unit_id: contract.unit_id.clone(),
            tenant_id: contract.tenant_id.clone(),
            payment_month: period,
            expected_amount: round_currency(rates.total_rent),
            amount_paid: Decimal::ZERO,
            status: ReceivableStatus::Pending,
            due_date: period.first_day(),
            category: RENT_CATEGORY.to_string(),
            is_autogenerated: true,
            created_at,
        }
    }

    pub fn outstanding(&self) -> Decimal {
        (self.expected_amount - self.amount_paid).max(Decimal::ZERO)
    }
}
