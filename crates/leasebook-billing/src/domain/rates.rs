//! Effective-rate resolution for a billing period.
//!
//! Rate histories are short (a handful of amendments per lease), so resolution
//! is a linear last-wins fold rather than a search.

use crate::domain::contracts::{RateChange, RateSnapshot};
use crate::domain::types::BillingMonth;

/// Resolve the rate in force for `period`.
///
/// `rate_changes` must be ascending by effective date. Every change whose
/// effective month is on or before `period` overwrites the running snapshot,
/// so the latest qualifying change wins. Without a qualifying change the
/// contract defaults apply. Amounts are returned unrounded.
pub fn resolve_rate(
    rate_changes: &[RateChange],
    period: BillingMonth,
    contract_defaults: &RateSnapshot,
) -> RateSnapshot {
    rate_changes
        .iter()
        .filter(|change| change.effective_month() <= period)
        .fold(contract_defaults.clone(), |_, change| change.rates())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ContractId;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn defaults(total: Decimal) -> RateSnapshot {
        RateSnapshot {
            base_rent: total,
            utilities: Decimal::ZERO,
            heating: Decimal::ZERO,
            total_rent: total,
        }
    }

    fn change(y: i32, m: u32, d: u32, total: Decimal) -> RateChange {
        RateChange::new(
            ContractId::new("c-1"),
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            total - dec!(150),
            dec!(100),
            dec!(50),
            total,
        )
    }

    fn month(s: &str) -> BillingMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_defaults_apply_without_changes() {
        let resolved = resolve_rate(&[], month("2024-05"), &defaults(dec!(950)));
        assert_eq!(resolved.total_rent, dec!(950));
    }

    #[test]
    fn test_later_change_wins_from_its_month() {
        let changes = vec![
            change(2024, 1, 1, dec!(1000)),
            change(2024, 7, 1, dec!(1200)),
        ];
        let base = defaults(dec!(900));

        assert_eq!(
            resolve_rate(&changes, month("2023-12"), &base).total_rent,
            dec!(900)
        );
        assert_eq!(
            resolve_rate(&changes, month("2024-06"), &base).total_rent,
            dec!(1000)
        );
        assert_eq!(
            resolve_rate(&changes, month("2024-07"), &base).total_rent,
            dec!(1200)
        );
        assert_eq!(
            resolve_rate(&changes, month("2026-01"), &base).total_rent,
            dec!(1200)
        );
    }

    #[test]
    fn test_mid_month_change_applies_to_whole_month() {
        let changes = vec![change(2024, 3, 28, dec!(1100))];
        let resolved = resolve_rate(&changes, month("2024-03"), &defaults(dec!(1000)));
        assert_eq!(resolved.total_rent, dec!(1100));
        assert_eq!(resolved.utilities, dec!(100));
        assert_eq!(resolved.heating, dec!(50));
    }

    #[test]
    fn test_same_month_changes_last_in_order_wins() {
        let changes = vec![
            change(2024, 4, 1, dec!(1000)),
            change(2024, 4, 20, dec!(1050)),
        ];
        let resolved = resolve_rate(&changes, month("2024-04"), &defaults(dec!(900)));
        assert_eq!(resolved.total_rent, dec!(1050));
    }

    #[test]
    fn test_no_rounding_at_resolution() {
        let changes = vec![change(2024, 1, 1, dec!(1000.125))];
        let resolved = resolve_rate(&changes, month("2024-01"), &defaults(dec!(900)));
        assert_eq!(resolved.total_rent, dec!(1000.125));
    }

    proptest! {
        #[test]
        fn prop_resolution_is_monotone_in_effective_month(
            first in 1u32..=12,
            gap in 1i64..36,
        ) {
            let first_month = BillingMonth::new(2024, first).unwrap();
            let second_month = first_month.add_months(gap);
            let changes = vec![
                change(first_month.year(), first_month.month(), 1, dec!(1000)),
                change(second_month.year(), second_month.month(), 1, dec!(1200)),
            ];
            let base = defaults(dec!(800));

            prop_assert_eq!(
                resolve_rate(&changes, first_month.add_months(-1), &base).total_rent,
                dec!(800)
            );
            prop_assert_eq!(
                resolve_rate(&changes, second_month.add_months(-1), &base).total_rent,
                dec!(1000)
            );
            prop_assert_eq!(
                resolve_rate(&changes, second_month, &base).total_rent,
                dec!(1200)
            );
        }
    }
}
