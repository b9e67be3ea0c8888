use crate::domain::contracts::ContractSchedule;
use crate::domain::types::ContractId;
use crate::error::{BillingError, Result};
use crate::storage::ContractRepository;
use std::sync::Arc;
use tracing::debug;

/// Loads a contract together with its rate history in evaluation order
pub struct ScheduleLoader {
    contracts: Arc<dyn ContractRepository + Send + Sync>,
}

impl ScheduleLoader {
    pub fn new(contracts: Arc<dyn ContractRepository + Send + Sync>) -> Self {
        Self { contracts }
    }

    pub async fn load(&self, contract_id: &ContractId) -> Result<ContractSchedule> {
        let contract = self
            .contracts
            .get_contract(contract_id)
            .await?
            .ok_or_else(|| BillingError::ContractNotFound {
                id: contract_id.to_string(),
            })?;

        let mut rate_changes = self.contracts.get_rate_changes(contract_id).await?;
        // Resolution is order dependent; stores are not trusted to sort.
        rate_changes.sort_by(|a, b| {
            a.effective_date
                .cmp(&b.effective_date)
                .then(a.created_at.cmp(&b.created_at))
        });

        debug!(
            "Loaded contract {} with {} rate changes",
            contract_id,
            rate_changes.len()
        );

        Ok(ContractSchedule {
            contract,
            rate_changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contracts::{Contract, RateChange};
    use crate::domain::types::{TenantId, UnitId};
    use crate::storage::MockContractRepository;
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn contract(id: &ContractId) -> Contract {
        Contract {
            id: id.clone(),
            unit_id: UnitId::new("u-1"),
            tenant_id: TenantId::new("t-1"),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            base_rent: dec!(800),
            utilities: dec!(100),
            heating: dec!(50),
            total_rent: dec!(950),
        }
    }

    #[tokio::test]
    async fn test_missing_contract_is_not_found() {
        let mut repo = MockContractRepository::new();
        repo.expect_get_contract().returning(|_| Ok(None));
        repo.expect_get_rate_changes().never();

        let loader = ScheduleLoader::new(Arc::new(repo));
        let result = loader.load(&ContractId::new("missing")).await;

        assert!(matches!(result, Err(BillingError::ContractNotFound { id }) if id == "missing"));
    }

    #[tokio::test]
    async fn test_rate_changes_are_sorted() {
        let id = ContractId::new("c-1");
        let stored = contract(&id);
        let now = Utc::now();

        let mut late = RateChange::new(
            id.clone(),
            NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            dec!(900),
            dec!(100),
            dec!(50),
            dec!(1050),
        );
        late.created_at = now - Duration::days(10);
        let mut early = RateChange::new(
            id.clone(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            dec!(850),
            dec!(100),
            dec!(50),
            dec!(1000),
        );
        early.created_at = now;
        let mut early_amended = early.clone();
        early_amended.total_rent = dec!(1010);
        early_amended.created_at = now + Duration::seconds(5);

        let unsorted = vec![late.clone(), early_amended.clone(), early.clone()];

        let mut repo = MockContractRepository::new();
        repo.expect_get_contract()
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_get_rate_changes()
            .returning(move |_| Ok(unsorted.clone()));

        let loader = ScheduleLoader::new(Arc::new(repo));
        let schedule = loader.load(&id).await.unwrap();

        let totals: Vec<_> = schedule
            .rate_changes
            .iter()
            .map(|c| c.total_rent)
            .collect();
        assert_eq!(totals, vec![dec!(1000), dec!(1010), dec!(1050)]);
    }
}
