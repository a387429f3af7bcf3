//! Two-wire master transaction engine
//!
//! One transaction is in flight at a time. The foreground builds a
//! [`Transaction`] and hands it to the engine; the bus interrupt then calls
//! [`TransactionEngine::on_bus_event`] once per byte until the transaction
//! completes and its [`Completion`] runs.

pub mod engine;
pub mod error;
pub mod shared;
pub mod transaction;
pub mod watchdog;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use engine::{EngineSnapshot, StartTransaction, TransactionEngine};
pub use error::TwiError;
pub use shared::SharedEngine;
pub use transaction::{Completion, Phase, Transaction, MAX_TRANSFER_LEN};
pub use watchdog::{BusHealth, StallMonitor, DEFAULT_STALL_TIMEOUT_MS};
