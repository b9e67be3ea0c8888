//! Shared building blocks for Leasebook binaries: logging initialization and
//! per-key mutual exclusion.

pub mod logging;
pub mod sync;

pub use sync::{KeyedLock, KeyedLockGuard};
