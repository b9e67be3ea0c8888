use crate::error::{BillingError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MAX_CONTRACT_ID_LEN: usize = 128;

/// Lease contract identifier as issued by the property-management domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate an identifier received from a caller
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BillingError::ValidationError {
                field: "contractId".to_string(),
                message: "contractId is required".to_string(),
            });
        }
        if trimmed.len() > MAX_CONTRACT_ID_LEN {
            return Err(BillingError::ValidationError {
                field: "contractId".to_string(),
                message: format!("contractId exceeds {} characters", MAX_CONTRACT_ID_LEN),
            });
        }
        if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(BillingError::ValidationError {
                field: "contractId".to_string(),
                message: "contractId contains invalid characters".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receivable item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceivableId(Uuid);

impl ReceivableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReceivableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReceivableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rate change identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateChangeId(Uuid);

impl RateChangeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RateChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RateChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar month used as the billing period key (`YYYY-MM`)
///
/// Ordering is chronological: the derive compares `year` before `month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth {
    year: i32,
    month: u32,
}

impl BillingMonth {
    pub const MIN: BillingMonth = BillingMonth { year: 1, month: 1 };
    pub const MAX: BillingMonth = BillingMonth {
        year: 9999,
        month: 12,
    };

    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(Self::MIN.year..=Self::MAX.year).contains(&year) {
            return Err(BillingError::ValidationError {
                field: "payment_month".to_string(),
                message: format!("{}-{} is not a valid billing month", year, month),
            });
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`, clamped to `MIN..=MAX`
    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_index(date.year() as i64 * 12 + (date.month() as i64 - 1))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // year and month are range-checked on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Months since year 0, January
    fn index(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    /// Saturates at `MIN` and `MAX` so every value formats as `YYYY-MM`
    fn from_index(index: i64) -> Self {
        let index = index.clamp(Self::MIN.index(), Self::MAX.index());
        Self {
            year: index.div_euclid(12) as i32,
            month: (index.rem_euclid(12) + 1) as u32,
        }
    }

    pub fn add_months(&self, months: i64) -> Self {
        Self::from_index(self.index() + months)
    }

    pub fn next(&self) -> Self {
        self.add_months(1)
    }

    /// Number of months from `self` to `other`, inclusive of both ends.
    /// Zero when `other` precedes `self`.
    pub fn months_through(&self, other: BillingMonth) -> usize {
        let span = other.index() - self.index() + 1;
        span.max(0) as usize
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingMonth {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BillingError::ValidationError {
            field: "payment_month".to_string(),
            message: format!("'{}' is not in YYYY-MM format", s),
        };

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BillingMonth> for String {
    fn from(month: BillingMonth) -> Self {
        month.to_string()
    }
}

/// Receivable lifecycle states. Transitions past `Pending` are driven by
/// payment processing, never by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableStatus {
    Pending,
    Overdue,
    Partial,
    Paid,
}

impl ReceivableStatus {
    /// Still open for regeneration
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ReceivableStatus::Pending | ReceivableStatus::Overdue | ReceivableStatus::Partial
        )
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, ReceivableStatus::Paid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceivableStatus::Pending => "pending",
            ReceivableStatus::Overdue => "overdue",
            ReceivableStatus::Partial => "partial",
            ReceivableStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for ReceivableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReceivableStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ReceivableStatus::Pending),
            "overdue" => Ok(ReceivableStatus::Overdue),
            "partial" => Ok(ReceivableStatus::Partial),
            "paid" => Ok(ReceivableStatus::Paid),
            other => Err(BillingError::ValidationError {
                field: "status".to_string(),
                message: format!("Unknown receivable status: {}", other),
            }),
        }
    }
}
