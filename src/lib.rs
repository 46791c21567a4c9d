//! Ledger Core - an in-process banking ledger.
//!
//! Accounts, cards, loans, and cash dispensers over an append-only
//! transaction log, with per-account serialization of balance mutations and
//! a scheduler for interest, fees, and overdue-loan sweeps.
//!
//! # Architecture
//!
//! - **Models**: plain data types with their policy tables (`models`)
//! - **Store**: in-memory persistence plus the per-account lock registry
//!   (`store`)
//! - **Services**: one service per domain, explicitly wired (`services`)
//! - **Events**: fire-and-forget broadcast of domain notifications (`events`)
//!
//! All monetary amounts are `i64` cents.

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{LedgerError, Result};
pub use events::{EventBus, Notification};
pub use services::Services;
