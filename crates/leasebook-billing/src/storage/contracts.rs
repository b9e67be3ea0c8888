use crate::domain::contracts::{Contract, RateChange};
use crate::domain::types::{ContractId, RateChangeId, TenantId, UnitId};
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn get_contract(&self, id: &ContractId) -> Result<Option<Contract>>;

    /// Rate changes for a contract, in no guaranteed order
    async fn get_rate_changes(&self, id: &ContractId) -> Result<Vec<RateChange>>;
}

pub struct SqlContractRepository {
    pool: PgPool,
}

impl SqlContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn contract_from_row(r: &sqlx::postgres::PgRow) -> Contract {
        Contract {
            id: ContractId::new(r.get::<String, _>("contract_id")),
            unit_id: UnitId::new(r.get::<String, _>("unit_id")),
            tenant_id: TenantId::new(r.get::<String, _>("tenant_id")),
            start_date: r.get("start_date"),
            end_date: r.get("end_date"),
            base_rent: r.get("base_rent"),
            utilities: r.get("utilities"),
            heating: r.get("heating"),
            total_rent: r.get("total_rent"),
        }
    }

    fn rate_change_from_row(r: &sqlx::postgres::PgRow) -> RateChange {
        RateChange {
            id: RateChangeId::from_uuid(r.get("rate_change_id")),
            contract_id: ContractId::new(r.get::<String, _>("contract_id")),
            effective_date: r.get("effective_date"),
            base_rent: r.get("base_rent"),
            utilities: r.get("utilities"),
            heating: r.get("heating"),
            total_rent: r.get("total_rent"),
            created_at: r.get("created_at"),
        }
    }
}

#[async_trait]
impl ContractRepository for SqlContractRepository {
    async fn get_contract(&self, id: &ContractId) -> Result<Option<Contract>> {
        let row = sqlx::query(
            r#"
            SELECT contract_id, unit_id, tenant_id, start_date, end_date,
                   base_rent, utilities, heating, total_rent
            FROM billing.contracts
            WHERE contract_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BillingError::store("get_contract", e))?;

        Ok(row.map(|r| Self::contract_from_row(&r)))
    }

    async fn get_rate_changes(&self, id: &ContractId) -> Result<Vec<RateChange>> {
        let rows = sqlx::query(
            r#"
            SELECT rate_change_id, contract_id, effective_date, base_rent,
                   utilities, heating, total_rent, created_at
            FROM billing.rate_changes
            WHERE contract_id = $1
            ORDER BY effective_date ASC, created_at ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BillingError::store("get_rate_changes", e))?;

        Ok(rows.iter().map(Self::rate_change_from_row).collect())
    }
}
