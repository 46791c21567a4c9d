//! Account entity and the per-type policy table.
//!
//! Balances are stored as `i64` cents to avoid floating-point drift; $10.50
//! is `1050`. Every rule about how far a balance may fall lives here, on the
//! account itself, so the ledger service and its collaborators evaluate
//! withdrawals through one code path.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed policy bundle attached to an account at creation.
///
/// The attributes (interest rate, fees, ceilings) are static per type and are
/// read through the accessor methods rather than stored on each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Personal cash wallet with no fees. The only type an owner may hold in
    /// multiples.
    Wallet,
    /// Standard checking account for everyday transactions.
    Checking,
    /// High-yield savings account for long-term storage.
    Savings,
    /// Business account with higher limits; the only type permitting
    /// overdraft.
    Business,
    /// Account for stock and investment holdings.
    Investment,
}

impl AccountType {
    pub fn display_name(&self) -> &'static str {
        match self {
            AccountType::Wallet => "Wallet",
            AccountType::Checking => "Checking Account",
            AccountType::Savings => "Savings Account",
            AccountType::Business => "Business Account",
            AccountType::Investment => "Investment Account",
        }
    }

    /// Annual interest rate in percent, credited monthly by the scheduler.
    pub fn interest_rate(&self) -> f64 {
        match self {
            AccountType::Wallet => 0.0,
            AccountType::Checking => 0.01,
            AccountType::Savings => 3.5,
            AccountType::Business => 1.0,
            // Returns depend on investments
            AccountType::Investment => 0.0,
        }
    }

    /// Monthly maintenance fee in cents, debited by the scheduler.
    pub fn monthly_fee_cents(&self) -> i64 {
        match self {
            AccountType::Wallet => 0,
            AccountType::Checking => 500,
            AccountType::Savings => 0,
            AccountType::Business => 2_500,
            AccountType::Investment => 1_000,
        }
    }

    /// Maximum withdrawn per day in cents; `None` means unlimited.
    pub fn max_daily_withdrawal_cents(&self) -> Option<i64> {
        match self {
            AccountType::Wallet => None,
            AccountType::Checking => Some(1_000_000),
            AccountType::Savings => Some(500_000),
            AccountType::Business => Some(5_000_000),
            AccountType::Investment => Some(2_500_000),
        }
    }

    /// Minimum balance requirement in cents. Advisory: recorded policy, not
    /// enforced by the withdrawal path.
    pub fn min_balance_cents(&self) -> i64 {
        match self {
            AccountType::Wallet => 0,
            AccountType::Checking => 0,
            AccountType::Savings => 10_000,
            AccountType::Business => 50_000,
            AccountType::Investment => 100_000,
        }
    }

    pub fn allows_overdraft(&self) -> bool {
        matches!(self, AccountType::Business)
    }
}

/// Outcome of a withdrawal attempt (or the withdrawal leg of a transfer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalResult {
    Success,
    InsufficientFunds,
    DailyLimitExceeded,
    AccountFrozen,
}

/// A monetary account owned by a single identity.
///
/// Balance, frozen flag, and the daily tally are mutated only by the account
/// ledger service; everything else is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique 10-digit account number.
    pub account_number: String,
    /// 9-digit routing number, identical for every account in this ledger.
    pub routing_number: String,
    /// Owner's identity.
    pub owner: Uuid,
    pub account_type: AccountType,
    /// Current balance in cents. May be negative only when the type permits
    /// overdraft, and never below `-overdraft_limit_cents`.
    pub balance_cents: i64,
    pub frozen: bool,
    /// Overdraft ceiling in cents; meaningful only for overdraft-capable
    /// types.
    pub overdraft_limit_cents: i64,
    /// Amount withdrawn on `last_withdrawal_date`, compared against the
    /// type's daily ceiling.
    pub daily_withdrawn_cents: i64,
    pub last_withdrawal_date: NaiveDate,
    /// Custom display name for the account.
    pub account_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Lowest balance this account is allowed to reach.
    pub fn min_allowed_balance_cents(&self) -> i64 {
        if self.account_type.allows_overdraft() {
            -self.overdraft_limit_cents
        } else {
            0
        }
    }

    /// Balance plus any overdraft headroom.
    pub fn available_balance_cents(&self) -> i64 {
        self.balance_cents - self.min_allowed_balance_cents()
    }

    /// The daily tally as of `today`. A tally carried over from an earlier
    /// date no longer counts.
    pub fn daily_withdrawn_on(&self, today: NaiveDate) -> i64 {
        if self.last_withdrawal_date == today {
            self.daily_withdrawn_cents
        } else {
            0
        }
    }

    /// Evaluate whether `amount_cents` could be withdrawn right now.
    ///
    /// Checks run in a fixed order: frozen flag, daily ceiling (skipped for
    /// unlimited types), then available balance. Pure; does not mutate.
    pub fn check_withdrawal(&self, amount_cents: i64, today: NaiveDate) -> WithdrawalResult {
        if self.frozen {
            return WithdrawalResult::AccountFrozen;
        }

        if let Some(max_daily) = self.account_type.max_daily_withdrawal_cents() {
            if self.daily_withdrawn_on(today) + amount_cents > max_daily {
                return WithdrawalResult::DailyLimitExceeded;
            }
        }

        if amount_cents > self.available_balance_cents() {
            return WithdrawalResult::InsufficientFunds;
        }

        WithdrawalResult::Success
    }
}
