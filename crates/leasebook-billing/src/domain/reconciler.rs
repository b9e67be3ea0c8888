//! Regeneration of a contract's auto-generated rent receivables.
//!
//! A recalculation always rebuilds from the contract's first month so that
//! retroactive rate changes reach every past period. Items that payment
//! processing has settled (and, by default, partially paid ones) are left
//! untouched and their months are skipped when generating.
//!
//! Recalculations of the same contract are serialized in-process and every
//! run is bounded by a deadline. Neither write strategy is transactional
//! across batches: a failure part-way leaves whatever already committed, and
//! re-running converges to the full schedule.

use crate::config::{ReconciliationConfig, WriteStrategy};
use crate::domain::clock::Clock;
use crate::domain::loader::ScheduleLoader;
use crate::domain::receivables::ReceivableItem;
use crate::domain::schedule::{plan_schedule, BillingWindow};
use crate::domain::types::{BillingMonth, ContractId, ReceivableId, ReceivableStatus};
use crate::error::{BillingError, Result};
use crate::storage::{ContractRepository, ReceivableRepository};
use chrono::NaiveDate;
use leasebook_common::KeyedLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub horizon_months: u32,
    pub deadline: Duration,
    pub write_strategy: WriteStrategy,
    pub protect_partial: bool,
    pub batch_size: usize,
}

impl From<&ReconciliationConfig> for ReconcilerSettings {
    fn from(config: &ReconciliationConfig) -> Self {
        Self {
            horizon_months: config.horizon_months,
            deadline: config.deadline(),
            write_strategy: config.write_strategy,
            protect_partial: config.protect_partial,
            batch_size: config.batch_size.max(1),
        }
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self::from(&ReconciliationConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationSummary {
    pub contract_id: ContractId,
    pub window: BillingWindow,
    /// Stale open items removed or superseded
    pub deleted_count: u64,
    /// Items written for the window
    pub generated_count: u64,
    /// Months skipped because their item is settled or protected
    pub retained_months: Vec<BillingMonth>,
}

impl RecalculationSummary {
    pub fn message(&self) -> String {
        format!(
            "Regenerated {} receivables for contract {} ({} to {}), replaced {} stale entries",
            self.generated_count, self.contract_id, self.window.start, self.window.end, self.deleted_count
        )
    }
}

/// What a recalculation would write, computed without touching the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePreview {
    pub contract_id: ContractId,
    pub window: BillingWindow,
    pub items: Vec<ReceivableItem>,
    pub stale_count: usize,
    pub retained_months: Vec<BillingMonth>,
}

struct ReconciliationPlan {
    contract_id: ContractId,
    window: BillingWindow,
    stale: Vec<ReceivableItem>,
    retained_months: BTreeSet<BillingMonth>,
    items: Vec<ReceivableItem>,
}

pub struct LedgerReconciler {
    loader: ScheduleLoader,
    receivables: Arc<dyn ReceivableRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
    locks: KeyedLock<ContractId>,
    settings: ReconcilerSettings,
}

impl LedgerReconciler {
    pub fn new(
        contracts: Arc<dyn ContractRepository + Send + Sync>,
        receivables: Arc<dyn ReceivableRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            loader: ScheduleLoader::new(contracts),
            receivables,
            clock,
            locks: KeyedLock::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Recalculate using the injected clock's date as "today"
    pub async fn recalculate(&self, contract_id: &ContractId) -> Result<RecalculationSummary> {
        let today = self.clock.today();
        self.recalculate_as_of(contract_id, today).await
    }

    #[instrument(skip_all, fields(contract_id = %contract_id, today = %today))]
    pub async fn recalculate_as_of(
        &self,
        contract_id: &ContractId,
        today: NaiveDate,
    ) -> Result<RecalculationSummary> {
        let started = Instant::now();

        let work = async {
            let _guard = self.locks.acquire(contract_id.clone()).await;
            self.reconcile(contract_id, today).await
        };

        let result = match tokio::time::timeout(self.settings.deadline, work).await {
            Ok(result) => result,
            Err(_) => Err(BillingError::DeadlineExceeded {
                contract_id: contract_id.to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        };

        if let Err(e) = &result {
            if e.is_client_error() {
                warn!("Recalculation of contract {} rejected: {}", contract_id, e);
            } else {
                error!("Recalculation of contract {} failed: {}", contract_id, e);
            }
        }
        result
    }

    /// Compute the schedule a recalculation would produce right now
    pub async fn preview(&self, contract_id: &ContractId) -> Result<SchedulePreview> {
        let plan = self.plan(contract_id, self.clock.today()).await?;

        Ok(SchedulePreview {
            contract_id: contract_id.clone(),
            window: plan.window,
            stale_count: plan.stale.len(),
            items: plan.items,
            retained_months: plan.retained_months.into_iter().collect(),
        })
    }

    fn is_replaceable(&self, status: ReceivableStatus) -> bool {
        !self.protected_statuses().contains(&status)
    }

    /// Statuses the store must refuse to delete or overwrite
    fn protected_statuses(&self) -> Vec<ReceivableStatus> {
        if self.settings.protect_partial {
            vec![ReceivableStatus::Paid, ReceivableStatus::Partial]
        } else {
            vec![ReceivableStatus::Paid]
        }
    }

    async fn plan(&self, contract_id: &ContractId, today: NaiveDate) -> Result<ReconciliationPlan> {
        let schedule = self.loader.load(contract_id).await?;
        let window =
            BillingWindow::for_contract(&schedule.contract, today, self.settings.horizon_months);

        let active = self
            .receivables
            .find_active_auto_items(contract_id, window.start)
            .await?;
        let mut retained_months = self
            .receivables
            .find_settled_months(contract_id, window.start)
            .await?;

        let (stale, protected): (Vec<_>, Vec<_>) = active
            .into_iter()
            .partition(|item| self.is_replaceable(item.status));

        for item in &protected {
            warn!(
                "Keeping {} receivable for contract {} in {} (paid {})",
                item.status, contract_id, item.payment_month, item.amount_paid
            );
            retained_months.insert(item.payment_month);
        }

        let items = plan_schedule(&schedule, &window, &retained_months, self.clock.now());

        debug!(
            "Planned {} receivables for {} to {}: {} stale, {} retained",
            items.len(),
            window.start,
            window.end,
            stale.len(),
            retained_months.len()
        );

        Ok(ReconciliationPlan {
            contract_id: contract_id.clone(),
            window,
            stale,
            retained_months,
            items,
        })
    }

    async fn reconcile(
        &self,
        contract_id: &ContractId,
        today: NaiveDate,
    ) -> Result<RecalculationSummary> {
        let plan = self.plan(contract_id, today).await?;

        let (deleted_count, generated_count) = match self.settings.write_strategy {
            WriteStrategy::Rebuild => self.rebuild(&plan).await?,
            WriteStrategy::Upsert => self.upsert(&plan).await?,
        };

        let summary = RecalculationSummary {
            contract_id: contract_id.clone(),
            window: plan.window,
            deleted_count,
            generated_count,
            retained_months: plan.retained_months.into_iter().collect(),
        };

        info!("{}", summary.message());
        Ok(summary)
    }

    /// Months that still hold a live auto-generated item after deletion
    async fn occupied_months(&self, plan: &ReconciliationPlan) -> Result<BTreeSet<BillingMonth>> {
        let mut occupied = self
            .receivables
            .find_settled_months(&plan.contract_id, plan.window.start)
            .await?;
        let active = self
            .receivables
            .find_active_auto_items(&plan.contract_id, plan.window.start)
            .await?;
        occupied.extend(active.into_iter().map(|item| item.payment_month));
        Ok(occupied)
    }

    /// Delete every stale item, then create the full plan
    async fn rebuild(&self, plan: &ReconciliationPlan) -> Result<(u64, u64)> {
        let stale_ids: Vec<ReceivableId> = plan.stale.iter().map(|item| item.id).collect();
        let protected = self.protected_statuses();

        let mut deleted = 0;
        for chunk in stale_ids.chunks(self.settings.batch_size) {
            deleted += self.receivables.delete_many(chunk, &protected).await?;
        }

        // Payment processing settled some items after the plan was read;
        // their months keep the existing item.
        let mut items: Vec<&ReceivableItem> = plan.items.iter().collect();
        if deleted < stale_ids.len() as u64 {
            let occupied = self.occupied_months(plan).await?;
            items.retain(|item| !occupied.contains(&item.payment_month));
            warn!(
                "{} stale receivables of contract {} changed during recalculation; kept as recorded",
                stale_ids.len() as u64 - deleted,
                plan.contract_id
            );
        }

        let mut generated = 0;
        for chunk in items.chunks(self.settings.batch_size) {
            let batch: Vec<ReceivableItem> = chunk.iter().map(|item| (*item).clone()).collect();
            generated += self.receivables.create_many(&batch).await?;
            debug!("Created {} of {} receivables", generated, items.len());
        }

        Ok((deleted, generated))
    }

    /// Upsert the plan in place, then delete stale items whose month is no
    /// longer planned (e.g. after the contract end date moved earlier)
    async fn upsert(&self, plan: &ReconciliationPlan) -> Result<(u64, u64)> {
        let planned: BTreeSet<BillingMonth> =
            plan.items.iter().map(|item| item.payment_month).collect();

        let (superseded, dropped): (Vec<&ReceivableItem>, Vec<&ReceivableItem>) = plan
            .stale
            .iter()
            .partition(|item| planned.contains(&item.payment_month));

        let protected = self.protected_statuses();

        let mut generated = 0;
        for chunk in plan.items.chunks(self.settings.batch_size) {
            generated += self.receivables.upsert_many(chunk, &protected).await?;
            debug!("Upserted {} of {} receivables", generated, plan.items.len());
        }

        let dropped_ids: Vec<ReceivableId> = dropped.iter().map(|item| item.id).collect();
        let mut removed = 0;
        for chunk in dropped_ids.chunks(self.settings.batch_size) {
            removed += self.receivables.delete_many(chunk, &protected).await?;
        }

        // Planned items the store refused were settled or protected after
        // the plan was read; their stale counterparts were not replaced.
        let skipped = plan.items.len() as u64 - generated.min(plan.items.len() as u64);
        if skipped > 0 {
            warn!(
                "{} receivables of contract {} changed during recalculation; kept as recorded",
                skipped, plan.contract_id
            );
        }

        Ok((
            (superseded.len() as u64).saturating_sub(skipped) + removed,
            generated,
        ))
    }
}
