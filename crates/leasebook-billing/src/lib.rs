pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod storage;

pub use config::BillingConfig;
pub use error::{BillingError, Result};
