//! Cash dispenser devices and the banks that own them.
//!
//! An ATM is a placement-bound device with its own cash reserve, fee
//! schedule, and single-withdrawal ceiling, distinct from the accounts it
//! serves. Devices are either system-owned or owned by a registered bank;
//! bank-owned devices charge non-members an out-of-network surcharge and
//! collect their fees into the bank's reserves.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owner id used by system (house) devices. System devices treat everyone as
/// a member and keep no reserves.
pub const SYSTEM_BANK: &str = "SYSTEM";

/// Device-side verdict on dispensing a given amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtmCheck {
    Ok,
    Offline,
    ExceedsLimit,
    InsufficientCash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atm {
    /// Unique device id, e.g. `ATM-1A2B3C4D`.
    pub atm_id: String,
    /// Opaque placement reference; at most one device per placement.
    pub placement: String,
    /// Owning bank id, or [`SYSTEM_BANK`].
    pub bank_id: String,
    /// Cash currently held by the device, in cents.
    pub cash_cents: i64,
    /// Maximum single withdrawal, in cents.
    pub max_withdrawal_cents: i64,
    /// Base fee charged on every withdrawal, in cents.
    pub transaction_fee_cents: i64,
    /// Surcharge added for non-members of the owning bank, in cents.
    pub out_of_network_fee_cents: i64,
    pub active: bool,
    pub placed_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Atm {
    /// A withdrawal may not exceed `min(max_withdrawal, cash_reserve)`, and
    /// the device must be active.
    pub fn check_dispense(&self, amount_cents: i64) -> AtmCheck {
        if !self.active {
            return AtmCheck::Offline;
        }
        if amount_cents > self.max_withdrawal_cents {
            return AtmCheck::ExceedsLimit;
        }
        if amount_cents > self.cash_cents {
            return AtmCheck::InsufficientCash;
        }
        AtmCheck::Ok
    }

    /// Total fee for one withdrawal. System devices waive the surcharge for
    /// everyone.
    pub fn total_fee_cents(&self, is_member: bool) -> i64 {
        if is_member || self.is_system() {
            self.transaction_fee_cents
        } else {
            self.transaction_fee_cents + self.out_of_network_fee_cents
        }
    }

    pub fn is_system(&self) -> bool {
        self.bank_id == SYSTEM_BANK
    }
}

/// Minimal bank registry entry: just enough for the ATM fee model. Bank
/// administration beyond reserves and membership lives outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub bank_id: String,
    pub name: String,
    /// Fees collected by this bank's devices accumulate here.
    pub reserves_cents: i64,
    pub members: HashSet<Uuid>,
}
