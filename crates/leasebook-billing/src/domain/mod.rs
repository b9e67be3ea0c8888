pub mod clock;
pub mod contracts;
pub mod loader;
pub mod rates;
pub mod receivables;
pub mod reconciler;
pub mod schedule;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use contracts::{Contract, ContractSchedule, RateChange, RateSnapshot};
pub use loader::ScheduleLoader;
pub use rates::resolve_rate;
pub use receivables::{round_currency, ReceivableItem, RENT_CATEGORY};
pub use reconciler::{LedgerReconciler, RecalculationSummary, ReconcilerSettings, SchedulePreview};
pub use schedule::{plan_schedule, BillingWindow};
pub use types::{
    BillingMonth, ContractId, RateChangeId, ReceivableId, ReceivableStatus, TenantId, UnitId,
};
