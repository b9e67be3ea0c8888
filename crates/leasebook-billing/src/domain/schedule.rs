use crate::domain::contracts::{Contract, ContractSchedule};
use crate::domain::rates::resolve_rate;
use crate::domain::receivables::ReceivableItem;
use crate::domain::types::BillingMonth;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive range of billing months regenerated for a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingWindow {
    pub start: BillingMonth,
    pub end: BillingMonth,
}

impl BillingWindow {
    /// Window from the contract's first month to its last month, or to
    /// `horizon_months` past `today` for open-ended contracts.
    ///
    /// The start never moves with `today`: the whole history is rebuilt so
    /// that retroactive rate changes reach every past period.
    pub fn for_contract(contract: &Contract, today: NaiveDate, horizon_months: u32) -> Self {
        let start = contract.first_month();
        let end = contract.last_month().unwrap_or_else(|| {
            BillingMonth::from_date(today).add_months(horizon_months as i64)
        });
        Self { start, end }
    }

    /// Empty when the end month precedes the start month
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn len(&self) -> usize {
        self.start.months_through(self.end)
    }

    pub fn months(&self) -> impl Iterator<Item = BillingMonth> {
        let start = self.start;
        (0..self.len() as i64).map(move |offset| start.add_months(offset))
    }
}

/// Build the receivables for every month of `window` except `skip`
pub fn plan_schedule(
    schedule: &ContractSchedule,
    window: &BillingWindow,
    skip: &BTreeSet<BillingMonth>,
    created_at: DateTime<Utc>,
) -> Vec<ReceivableItem> {
    let defaults = schedule.contract.default_rates();

    window
        .months()
        .filter(|month| !skip.contains(month))
        .map(|month| {
            let rates = resolve_rate(&schedule.rate_changes, month, &defaults);
            ReceivableItem::scheduled(&schedule.contract, month, &rates, created_at)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contracts::RateChange;
    use crate::domain::types::{ContractId, TenantId, UnitId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(start: NaiveDate, end: Option<NaiveDate>) -> Contract {
        Contract {
            id: ContractId::new("c-1"),
            unit_id: UnitId::new("u-1"),
            tenant_id: TenantId::new("t-1"),
            start_date: start,
            end_date: end,
            base_rent: dec!(800),
            utilities: dec!(100),
            heating: dec!(50),
            total_rent: dec!(950),
        }
    }

    #[test]
    fn test_fixed_term_window() {
        let c = contract(date(2024, 1, 15), Some(date(2024, 4, 10)));
        let window = BillingWindow::for_contract(&c, date(2030, 6, 1), 24);

        assert_eq!(window.start.to_string(), "2024-01");
        assert_eq!(window.end.to_string(), "2024-04");
        assert_eq!(window.len(), 4);
        let months: Vec<String> = window.months().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03", "2024-04"]);
    }

    #[test]
    fn test_open_ended_window_spans_horizon() {
        let today = date(2025, 3, 18);
        let c = contract(date(2025, 3, 1), None);
        let window = BillingWindow::for_contract(&c, today, 24);

        assert_eq!(window.start.to_string(), "2025-03");
        assert_eq!(window.end.to_string(), "2027-03");
        assert_eq!(window.len(), 25);
    }

    #[test]
    fn test_end_before_start_is_empty() {
        let c = contract(date(2024, 5, 1), Some(date(2024, 3, 31)));
        let window = BillingWindow::for_contract(&c, date(2024, 1, 1), 24);
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
        assert_eq!(window.months().count(), 0);
    }

    #[test]
    fn test_plan_skips_retained_months_and_applies_changes() {
        let c = contract(date(2024, 1, 1), Some(date(2024, 6, 30)));
        let schedule = ContractSchedule {
            rate_changes: vec![RateChange::new(
                c.id.clone(),
                date(2024, 4, 1),
                dec!(850),
                dec!(100),
                dec!(50),
                dec!(1000),
            )],
            contract: c,
        };
        let window = BillingWindow::for_contract(&schedule.contract, date(2024, 1, 1), 24);
        let skip: BTreeSet<BillingMonth> = ["2024-02".parse().unwrap()].into_iter().collect();

        let items = plan_schedule(&schedule, &window, &skip, Utc::now());
        let summary: Vec<(String, String)> = items
            .iter()
            .map(|i| (i.payment_month.to_string(), i.expected_amount.to_string()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("2024-01".to_string(), "950.00".to_string()),
                ("2024-03".to_string(), "950.00".to_string()),
                ("2024-04".to_string(), "1000.00".to_string()),
                ("2024-05".to_string(), "1000.00".to_string()),
                ("2024-06".to_string(), "1000.00".to_string()),
            ]
        );
    }
}
