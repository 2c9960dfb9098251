//! Account ledger — in-memory balances with an append-only transaction log.
//!
//! [`LedgerEngine`] applies deposits and withdrawals atomically per account:
//! the balance update and the log append commit together, balances never go
//! negative, and operations on different accounts run in parallel.

pub mod engine;
pub mod error;
pub mod grpc;
pub mod locks;
pub mod log;
pub mod metrics;
pub mod store;
pub mod telemetry;
pub mod types;

pub mod proto {
    tonic::include_proto!("ledger.v1");
}

pub use engine::LedgerEngine;
pub use error::LedgerError;
pub use log::TransactionLog;
pub use store::AccountStore;
pub use types::{AccountId, Balance, Transaction, TransactionId, TransactionKind};
