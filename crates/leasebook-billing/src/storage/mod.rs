pub mod contracts;
pub mod database;
pub mod memory;
pub mod receivables;

pub use contracts::{ContractRepository, SqlContractRepository};

pub use receivables::{ReceivableRepository, SqlReceivableRepository};

pub use memory::InMemoryLedgerStore;

pub use database::{connect, run_migrations};

#[cfg(test)]
pub use contracts::MockContractRepository;

#[cfg(test)]
pub use receivables::MockReceivableRepository;
