use crate::domain::types::{BillingMonth, ContractId, RateChangeId, TenantId, UnitId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rent components in force for one billing period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSnapshot {
    pub base_rent: Decimal,
    pub utilities: Decimal,
    pub heating: Decimal,
    pub total_rent: Decimal,
}

/// Lease contract, read-only to the billing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: ContractId,
    pub unit_id: UnitId,
    pub tenant_id: TenantId,
    pub start_date: NaiveDate,
    /// `None` for open-ended leases
    pub end_date: Option<NaiveDate>,
    pub base_rent: Decimal,
    pub utilities: Decimal,
    pub heating: Decimal,
    pub total_rent: Decimal,
}

impl Contract {
    /// Rates agreed at signing, valid from `start_date`
    pub fn default_rates(&self) -> RateSnapshot {
        RateSnapshot {
            base_rent: self.base_rent,
            utilities: self.utilities,
            heating: self.heating,
            total_rent: self.total_rent,
        }
    }

    pub fn first_month(&self) -> BillingMonth {
        BillingMonth::from_date(self.start_date)
    }

    pub fn last_month(&self) -> Option<BillingMonth> {
        self.end_date.map(BillingMonth::from_date)
    }
}

/// Append-only rent amendment. Applies from the first day of the month
/// containing `effective_date` until a later change supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateChange {
    pub id: RateChangeId,
    pub contract_id: ContractId,
    pub effective_date: NaiveDate,
    pub base_rent: Decimal,
    pub utilities: Decimal,
    pub heating: Decimal,
    pub total_rent: Decimal,
    pub created_at: DateTime<Utc>,
}

impl RateChange {
    pub fn new(
        contract_id: ContractId,
        effective_date: NaiveDate,
        base_rent: Decimal,
        utilities: Decimal,
        heating: Decimal,
        total_rent: Decimal,
    ) -> Self {
        Self {
            id: RateChangeId::new(),
            contract_id,
            effective_date,
            base_rent,
            utilities,
            heating,
            total_rent,
            created_at: Utc::now(),
        }
    }

    pub fn effective_month(&self) -> BillingMonth {
        BillingMonth::from_date(self.effective_date)
    }

    pub fn rates(&self) -> RateSnapshot {
        RateSnapshot {
            base_rent: self.base_rent,
            utilities: self.utilities,
            heating: self.heating,
            total_rent: self.total_rent,
        }
    }
}

/// Contract plus its rate history in evaluation order
#[derive(Debug, Clone)]
pub struct ContractSchedule {
    pub contract: Contract,
    /// Ascending by `effective_date`, then `created_at`
    pub rate_changes: Vec<RateChange>,
}
