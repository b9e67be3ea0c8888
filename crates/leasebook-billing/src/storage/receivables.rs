use crate::domain::receivables::ReceivableItem;
use crate::domain::types::{
    BillingMonth, ContractId, ReceivableId, ReceivableStatus, TenantId, UnitId,
};
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

/// Ledger access needed by the reconciler.
///
/// Writes take the statuses the caller wants left alone. Implementations check
/// them against the stored row at write time, since payment processing may
/// change an item between the reconciler's read and its write. `paid` items
/// are never deleted or overwritten, whatever the caller passes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReceivableRepository: Send + Sync {
    /// Auto-generated items of the contract from `from` onward that are still
    /// pending, overdue or partially paid
    async fn find_active_auto_items(
        &self,
        contract_id: &ContractId,
        from: BillingMonth,
    ) -> Result<Vec<ReceivableItem>>;

    /// Months from `from` onward holding a paid auto-generated item
    async fn find_settled_months(
        &self,
        contract_id: &ContractId,
        from: BillingMonth,
    ) -> Result<BTreeSet<BillingMonth>>;

    /// Every item of the contract, manual ones included, by payment month
    async fn list_items(&self, contract_id: &ContractId) -> Result<Vec<ReceivableItem>>;

    /// Delete auto-generated items whose stored status is not protected
    async fn delete_many(
        &self,
        ids: &[ReceivableId],
        protected: &[ReceivableStatus],
    ) -> Result<u64>;

    /// Insert new items; fails on a second auto-generated item for the same
    /// contract and month
    async fn create_many(&self, items: &[ReceivableItem]) -> Result<u64>;

    /// Insert or replace auto-generated items keyed by (contract, month),
    /// leaving items with a protected status as they are
    async fn upsert_many(
        &self,
        items: &[ReceivableItem],
        protected: &[ReceivableStatus],
    ) -> Result<u64>;
}

pub struct SqlReceivableRepository {
    pool: PgPool,
}

impl SqlReceivableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn item_from_row(r: &sqlx::postgres::PgRow) -> Result<ReceivableItem> {
        let payment_month: String = r.get("payment_month");
        let status: String = r.get("status");

        Ok(ReceivableItem {
            id: ReceivableId::from_uuid(r.get("receivable_id")),
            contract_id: ContractId::new(r.get::<String, _>("contract_id")),
            unit_id: UnitId::new(r.get::<String, _>("unit_id")),
            tenant_id: TenantId::new(r.get::<String, _>("tenant_id")),
            payment_month: payment_month.parse()?,
            expected_amount: r.get("expected_amount"),
            amount_paid: r.get("amount_paid"),
            status: status.parse::<ReceivableStatus>()?,
            due_date: r.get("due_date"),
            category: r.get("category"),
            is_autogenerated: r.get("is_autogenerated"),
            created_at: r.get("created_at"),
        })
    }

    fn protected_names(protected: &[ReceivableStatus]) -> Vec<String> {
        std::iter::once(ReceivableStatus::Paid)
            .chain(protected.iter().copied())
            .map(|status| status.as_str().to_string())
            .collect()
    }

    fn map_write_error(operation: &str, item: &ReceivableItem, e: sqlx::Error) -> BillingError {
        let is_unique_violation = e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == UNIQUE_VIOLATION)
            .unwrap_or(false);

        if is_unique_violation {
            BillingError::DuplicateReceivable {
                contract_id: item.contract_id.to_string(),
                payment_month: item.payment_month.to_string(),
            }
        } else {
            BillingError::store(operation, e)
        }
    }
}

#[async_trait]
impl ReceivableRepository for SqlReceivableRepository {
    async fn find_active_auto_items(
        &self,
        contract_id: &ContractId,
        from: BillingMonth,
    ) -> Result<Vec<ReceivableItem>> {
        let rows = sqlx::query(
            r#"
            SELECT receivable_id, contract_id, unit_id, tenant_id, payment_month,
                   expected_amount, amount_paid, status, due_date, category,
                   is_autogenerated, created_at
            FROM billing.receivable_items
            WHERE contract_id = $1
              AND is_autogenerated = true
              AND payment_month >= $2
              AND status IN ('pending', 'overdue', 'partial')
            ORDER BY payment_month ASC
            "#,
        )
        .bind(contract_id.as_str())
        .bind(from.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BillingError::store("find_active_auto_items", e))?;

        rows.iter().map(Self::item_from_row).collect()
    }

    async fn find_settled_months(
        &self,
        contract_id: &ContractId,
        from: BillingMonth,
    ) -> Result<BTreeSet<BillingMonth>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT payment_month
            FROM billing.receivable_items
            WHERE contract_id = $1
              AND is_autogenerated = true
              AND payment_month >= $2
              AND status = 'paid'
            "#,
        )
        .bind(contract_id.as_str())
        .bind(from.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BillingError::store("find_settled_months", e))?;

        rows.iter()
            .map(|r| r.get::<String, _>("payment_month").parse())
            .collect()
    }

    async fn list_items(&self, contract_id: &ContractId) -> Result<Vec<ReceivableItem>> {
        let rows = sqlx::query(
            r#"
            SELECT receivable_id, contract_id, unit_id, tenant_id, payment_month,
                   expected_amount, amount_paid, status, due_date, category,
                   is_autogenerated, created_at
            FROM billing.receivable_items
            WHERE contract_id = $1
            ORDER BY payment_month ASC, created_at ASC
            "#,
        )
        .bind(contract_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BillingError::store("list_items", e))?;

        rows.iter().map(Self::item_from_row).collect()
    }

    async fn delete_many(
        &self,
        ids: &[ReceivableId],
        protected: &[ReceivableStatus],
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();

        let result = sqlx::query(
            r#"
            DELETE FROM billing.receivable_items
            WHERE receivable_id = ANY($1)
              AND is_autogenerated = true
              AND status <> ALL($2)
            "#,
        )
        .bind(&ids)
        .bind(Self::protected_names(protected))
        .execute(&self.pool)
        .await
        .map_err(|e| BillingError::store("delete_many", e))?;

        debug!("Deleted {} of {} receivable items", result.rows_affected(), ids.len());
        Ok(result.rows_affected())
    }

    async fn create_many(&self, items: &[ReceivableItem]) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BillingError::store("create_many", e))?;

        let mut created = 0;
        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO billing.receivable_items (
                    receivable_id, contract_id, unit_id, tenant_id, payment_month,
                    expected_amount, amount_paid, status, due_date, category,
                    is_autogenerated, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.contract_id.as_str())
            .bind(item.unit_id.as_str())
            .bind(item.tenant_id.as_str())
            .bind(item.payment_month.to_string())
            .bind(item.expected_amount)
            .bind(item.amount_paid)
            .bind(item.status.as_str())
            .bind(item.due_date)
            .bind(&item.category)
            .bind(item.is_autogenerated)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_write_error("create_many", item, e))?;

            created += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| BillingError::store("create_many", e))?;

        Ok(created)
    }

    async fn upsert_many(
        &self,
        items: &[ReceivableItem],
        protected: &[ReceivableStatus],
    ) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let protected = Self::protected_names(protected);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BillingError::store("upsert_many", e))?;

        let mut written = 0;
        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO billing.receivable_items (
                    receivable_id, contract_id, unit_id, tenant_id, payment_month,
                    expected_amount, amount_paid, status, due_date, category,
                    is_autogenerated, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true, $11)
                ON CONFLICT (contract_id, payment_month) WHERE is_autogenerated
                DO UPDATE SET
                    unit_id = EXCLUDED.unit_id,
                    tenant_id = EXCLUDED.tenant_id,
                    expected_amount = EXCLUDED.expected_amount,
                    amount_paid = EXCLUDED.amount_paid,
                    status = EXCLUDED.status,
                    due_date = EXCLUDED.due_date,
                    category = EXCLUDED.category,
                    updated_at = NOW()
                WHERE billing.receivable_items.status <> ALL($12)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.contract_id.as_str())
            .bind(item.unit_id.as_str())
            .bind(item.tenant_id.as_str())
            .bind(item.payment_month.to_string())
            .bind(item.expected_amount)
            .bind(item.amount_paid)
            .bind(item.status.as_str())
            .bind(item.due_date)
            .bind(&item.category)
            .bind(item.created_at)
            .bind(&protected)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_write_error("upsert_many", item, e))?;

            written += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| BillingError::store("upsert_many", e))?;

        Ok(written)
    }
}
