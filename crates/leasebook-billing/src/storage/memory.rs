use crate::domain::contracts::{Contract, RateChange};
use crate::domain::receivables::ReceivableItem;
use crate::domain::types::{BillingMonth, ContractId, ReceivableId, ReceivableStatus};
use crate::error::{BillingError, Result};
use crate::storage::{ContractRepository, ReceivableRepository};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Ledger store held in process memory.
///
/// Backs the `memory` storage backend and the test suites. Writes enforce the
/// same rules as the Postgres store: one auto-generated item per contract and
/// month, and paid items, plus any status the caller protects, are never deleted or
/// overwritten.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    contracts: RwLock<HashMap<ContractId, Contract>>,
    rate_changes: RwLock<HashMap<ContractId, Vec<RateChange>>>,
    receivables: RwLock<HashMap<ReceivableId, ReceivableItem>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_contract(&self, contract: Contract) {
        let mut contracts = self.contracts.write().await;
        contracts.insert(contract.id.clone(), contract);
    }

    pub async fn insert_rate_change(&self, change: RateChange) {
        let mut rate_changes = self.rate_changes.write().await;
        rate_changes
            .entry(change.contract_id.clone())
            .or_default()
            .push(change);
    }

    /// Store an item as-is, bypassing the uniqueness check. Used to seed
    /// manual entries and items already touched by payment processing.
    pub async fn insert_receivable(&self, item: ReceivableItem) {
        let mut receivables = self.receivables.write().await;
        receivables.insert(item.id, item);
    }

    /// Record a payment state change, as payment processing would
    pub async fn set_payment_state(
        &self,
        id: &ReceivableId,
        status: ReceivableStatus,
        amount_paid: Decimal,
    ) -> Result<()> {
        let mut receivables = self.receivables.write().await;
        let item = receivables
            .get_mut(id)
            .ok_or_else(|| BillingError::ValidationError {
                field: "receivable_id".to_string(),
                message: format!("Receivable not found: {}", id),
            })?;
        item.status = status;
        item.amount_paid = amount_paid;
        Ok(())
    }

    /// Auto-generated item for a contract and month, if any
    pub async fn find_auto_item(
        &self,
        contract_id: &ContractId,
        month: BillingMonth,
    ) -> Option<ReceivableItem> {
        let receivables = self.receivables.read().await;
        receivables
            .values()
            .find(|i| i.is_autogenerated && i.contract_id == *contract_id && i.payment_month == month)
            .cloned()
    }
}

fn is_protected(status: ReceivableStatus, protected: &[ReceivableStatus]) -> bool {
    status.is_settled() || protected.contains(&status)
}

fn same_slot(a: &ReceivableItem, b: &ReceivableItem) -> bool {
    a.is_autogenerated
        && b.is_autogenerated
        && a.contract_id == b.contract_id
        && a.payment_month == b.payment_month
}

#[async_trait]
impl ContractRepository for InMemoryLedgerStore {
    async fn get_contract(&self, id: &ContractId) -> Result<Option<Contract>> {
        let contracts = self.contracts.read().await;
        Ok(contracts.get(id).cloned())
    }

    async fn get_rate_changes(&self, id: &ContractId) -> Result<Vec<RateChange>> {
        let rate_changes = self.rate_changes.read().await;
        Ok(rate_changes.get(id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ReceivableRepository for InMemoryLedgerStore {
    async fn find_active_auto_items(
        &self,
        contract_id: &ContractId,
        from: BillingMonth,
    ) -> Result<Vec<ReceivableItem>> {
        let receivables = self.receivables.read().await;
        let mut items: Vec<ReceivableItem> = receivables
            .values()
            .filter(|i| {
                i.contract_id == *contract_id
                    && i.is_autogenerated
                    && i.payment_month >= from
                    && i.status.is_active()
            })
            .cloned()
            .collect();
        items.sort_by_key(|i| i.payment_month);
        Ok(items)
    }

    async fn find_settled_months(
        &self,
        contract_id: &ContractId,
        from: BillingMonth,
    ) -> Result<BTreeSet<BillingMonth>> {
        let receivables = self.receivables.read().await;
        Ok(receivables
            .values()
            .filter(|i| {
                i.contract_id == *contract_id
                    && i.is_autogenerated
                    && i.payment_month >= from
                    && i.status.is_settled()
            })
            .map(|i| i.payment_month)
            .collect())
    }

    async fn list_items(&self, contract_id: &ContractId) -> Result<Vec<ReceivableItem>> {
        let receivables = self.receivables.read().await;
        let mut items: Vec<ReceivableItem> = receivables
            .values()
            .filter(|i| i.contract_id == *contract_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.payment_month
                .cmp(&b.payment_month)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(items)
    }

    async fn delete_many(
        &self,
        ids: &[ReceivableId],
        protected: &[ReceivableStatus],
    ) -> Result<u64> {
        let mut receivables = self.receivables.write().await;
        let mut deleted = 0;
        for id in ids {
            let deletable = receivables
                .get(id)
                .map(|i| i.is_autogenerated && !is_protected(i.status, protected))
                .unwrap_or(false);
            if deletable {
                receivables.remove(id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn create_many(&self, items: &[ReceivableItem]) -> Result<u64> {
        let mut receivables = self.receivables.write().await;

        // Validate the whole batch first so a rejected batch writes nothing
        for (index, item) in items.iter().enumerate() {
            let clashes_stored = receivables.values().any(|existing| same_slot(existing, item));
            let clashes_batch = items[..index].iter().any(|earlier| same_slot(earlier, item));
            if clashes_stored || clashes_batch {
                return Err(BillingError::DuplicateReceivable {
                    contract_id: item.contract_id.to_string(),
                    payment_month: item.payment_month.to_string(),
                });
            }
        }

        for item in items {
            receivables.insert(item.id, item.clone());
        }
        Ok(items.len() as u64)
    }

    async fn upsert_many(
        &self,
        items: &[ReceivableItem],
        protected: &[ReceivableStatus],
    ) -> Result<u64> {
        let mut receivables = self.receivables.write().await;
        let mut written = 0;

        for item in items {
            let existing = receivables
                .values()
                .find(|existing| same_slot(existing, item))
                .map(|existing| (existing.id, existing.created_at, existing.status));

            match existing {
                Some((_, _, status)) if is_protected(status, protected) => {}
                Some((id, created_at, _)) => {
                    receivables.insert(
                        id,
                        ReceivableItem {
                            id,
                            created_at,
                            is_autogenerated: true,
                            ..item.clone()
                        },
                    );
                    written += 1;
                }
                None => {
                    receivables.insert(
                        item.id,
                        ReceivableItem {
                            is_autogenerated: true,
                            ..item.clone()
                        },
                    );
                    written += 1;
                }
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contracts::RateSnapshot;
    use crate::domain::types::{TenantId, UnitId};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn contract() -> Contract {
        Contract {
            id: ContractId::new("c-1"),
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

    fn item(month: &str, total: Decimal) -> ReceivableItem {
        let rates = RateSnapshot {
            total_rent: total,
            ..contract().default_rates()
        };
        ReceivableItem::scheduled(&contract(), month.parse().unwrap(), &rates, Utc::now())
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_month() {
        let store = InMemoryLedgerStore::new();
        store.create_many(&[item("2024-01", dec!(950))]).await.unwrap();

        let result = store
            .create_many(&[item("2024-02", dec!(950)), item("2024-01", dec!(950))])
            .await;
        assert!(matches!(
            result,
            Err(BillingError::DuplicateReceivable { .. })
        ));

        // Rejected batch left nothing behind
        let items = store.list_items(&ContractId::new("c-1")).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_manual_items_do_not_clash() {
        let store = InMemoryLedgerStore::new();
        let mut manual = item("2024-01", dec!(120));
        manual.is_autogenerated = false;
        store.insert_receivable(manual).await;

        let created = store.create_many(&[item("2024-01", dec!(950))]).await.unwrap();
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_paid_items_survive_delete_and_upsert() {
        let store = InMemoryLedgerStore::new();
        let paid = item("2024-03", dec!(950));
        let paid_id = paid.id;
        store.create_many(&[paid]).await.unwrap();
        store
            .set_payment_state(&paid_id, ReceivableStatus::Paid, dec!(950))
            .await
            .unwrap();

        assert_eq!(store.delete_many(&[paid_id], &[]).await.unwrap(), 0);
        assert_eq!(
            store.upsert_many(&[item("2024-03", dec!(1200))], &[]).await.unwrap(),
            0
        );

        let kept = store
            .find_auto_item(&ContractId::new("c-1"), "2024-03".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(kept.id, paid_id);
        assert_eq!(kept.expected_amount, dec!(950));
        assert_eq!(kept.status, ReceivableStatus::Paid);
    }

    #[tokio::test]
    async fn test_protected_statuses_are_checked_at_write_time() {
        let store = InMemoryLedgerStore::new();
        let partial = item("2024-04", dec!(950));
        let partial_id = partial.id;
        store.create_many(&[partial]).await.unwrap();
        store
            .set_payment_state(&partial_id, ReceivableStatus::Partial, dec!(400))
            .await
            .unwrap();

        let protected = [ReceivableStatus::Partial];
        assert_eq!(store.delete_many(&[partial_id], &protected).await.unwrap(), 0);
        assert_eq!(
            store
                .upsert_many(&[item("2024-04", dec!(1200))], &protected)
                .await
                .unwrap(),
            0
        );

        let kept = store
            .find_auto_item(&ContractId::new("c-1"), "2024-04".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(kept.id, partial_id);
        assert_eq!(kept.amount_paid, dec!(400));
        assert_eq!(kept.status, ReceivableStatus::Partial);

        // Unprotected, the same item is replaceable
        assert_eq!(store.delete_many(&[partial_id], &[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_open_item_in_place() {
        let store = InMemoryLedgerStore::new();
        let original = item("2024-05", dec!(950));
        let original_id = original.id;
        store.create_many(&[original]).await.unwrap();
        store
            .set_payment_state(&original_id, ReceivableStatus::Overdue, Decimal::ZERO)
            .await
            .unwrap();

        let written = store
            .upsert_many(&[item("2024-05", dec!(1000)), item("2024-06", dec!(1000))], &[])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let replaced = store
            .find_auto_item(&ContractId::new("c-1"), "2024-05".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(replaced.id, original_id);
        assert_eq!(replaced.expected_amount, dec!(1000));
        assert_eq!(replaced.status, ReceivableStatus::Pending);
    }

    #[tokio::test]
    async fn test_find_active_respects_lower_bound() {
        let store = InMemoryLedgerStore::new();
        store
            .create_many(&[
                item("2023-12", dec!(900)),
                item("2024-01", dec!(950)),
                item("2024-02", dec!(950)),
            ])
            .await
            .unwrap();

        let active = store
            .find_active_auto_items(&ContractId::new("c-1"), "2024-01".parse().unwrap())
            .await
            .unwrap();
        let months: Vec<String> = active.iter().map(|i| i.payment_month.to_string()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02"]);
    }
}
