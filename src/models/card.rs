//! Spending cards issued against accounts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::account::AccountType;

/// Card product tier. Carries the default daily spend ceiling and the annual
/// fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Debit,
    Credit,
    BusinessDebit,
    BusinessCredit,
    Premium,
}

impl CardType {
    pub fn display_name(&self) -> &'static str {
        match self {
            CardType::Debit => "Debit Card",
            CardType::Credit => "Credit Card",
            CardType::BusinessDebit => "Business Debit Card",
            CardType::BusinessCredit => "Business Credit Card",
            CardType::Premium => "Premium Card",
        }
    }

    /// Default daily spend ceiling in cents, copied onto the card at issue.
    pub fn default_daily_limit_cents(&self) -> i64 {
        match self {
            CardType::Debit => 500_000,
            CardType::Credit => 1_000_000,
            CardType::BusinessDebit => 2_500_000,
            CardType::BusinessCredit => 5_000_000,
            CardType::Premium => 10_000_000,
        }
    }

    pub fn annual_fee_cents(&self) -> i64 {
        match self {
            CardType::Debit => 0,
            CardType::Credit => 5_000,
            CardType::BusinessDebit => 0,
            CardType::BusinessCredit => 10_000,
            CardType::Premium => 25_000,
        }
    }

    /// Fixed compatibility table between card tiers and account types.
    /// Premium cards may be issued against anything.
    pub fn is_compatible_with(&self, account_type: AccountType) -> bool {
        match self {
            CardType::Debit | CardType::Credit => matches!(
                account_type,
                AccountType::Checking | AccountType::Savings | AccountType::Wallet
            ),
            CardType::BusinessDebit | CardType::BusinessCredit => {
                account_type == AccountType::Business
            }
            CardType::Premium => true,
        }
    }
}

/// Outcome of a point-of-sale authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardUseResult {
    Success,
    CardInactive,
    CardFrozen,
    CardExpired,
    DailyLimitExceeded,
    InvalidPin,
    InsufficientFunds,
}

/// A spending card linked to one account.
///
/// Cancelled cards (`active == false`) are permanently inert; there is no
/// reactivation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Luhn-valid 16-digit card number.
    pub card_number: String,
    /// 3-digit verification code.
    pub cvv: String,
    pub linked_account: String,
    pub owner: Uuid,
    pub card_type: CardType,
    pub expiration_date: NaiveDate,
    /// Salted one-way PIN hash, `salt_hex$mac_hex`.
    pub pin_hash: String,
    pub daily_limit_cents: i64,
    /// Amount authorized on the day of `last_used`.
    pub spent_today_cents: i64,
    pub last_used: Option<DateTime<Utc>>,
    pub active: bool,
    pub frozen: bool,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        today > self.expiration_date
    }

    /// The spend tally as of `today`; a tally from an earlier date no longer
    /// counts.
    pub fn spent_on(&self, today: NaiveDate) -> i64 {
        match self.last_used {
            Some(at) if at.date_naive() == today => self.spent_today_cents,
            _ => 0,
        }
    }

    /// Card-side checks for an authorization, in order: inactive, frozen,
    /// expired, daily limit. Does not consult the linked account.
    pub fn check_spend(&self, amount_cents: i64, today: NaiveDate) -> CardUseResult {
        if !self.active {
            return CardUseResult::CardInactive;
        }
        if self.frozen {
            return CardUseResult::CardFrozen;
        }
        if self.is_expired(today) {
            return CardUseResult::CardExpired;
        }
        if self.spent_on(today) + amount_cents > self.daily_limit_cents {
            return CardUseResult::DailyLimitExceeded;
        }
        CardUseResult::Success
    }

    /// `**** **** **** 1234` rendering for statements and logs.
    pub fn masked_number(&self) -> String {
        let tail: String = self
            .card_number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("**** **** **** {tail}")
    }
}
