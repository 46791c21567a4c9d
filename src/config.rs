//! Runtime configuration loaded from environment variables.
//!
//! Uses the `envy` crate to deserialize environment variables into a
//! type-safe struct; a `.env` file is loaded first when present. Every knob
//! has a default, so an empty environment yields a fully working ledger.

use serde::Deserialize;

use crate::models::account::AccountType;

/// Ledger configuration.
///
/// # Environment Variables
///
/// - `ROUTING_NUMBER`: 9-digit routing number stamped on every account
/// - `SCHEDULER_TICK_SECS`: how often the interest/fee scheduler wakes up
/// - `LOAN_DEFAULT_THRESHOLD`: cumulative missed payments before a loan
///   defaults
/// - `LOAN_EXPOSURE_MULTIPLIER`: outstanding loan balance may not exceed this
///   multiple of the borrower's total deposits
/// - `PRIMARY_ACCOUNT_ORDER`: comma-separated account types tried in order
///   when resolving an owner's primary account (e.g. `checking,wallet`)
/// - `CARD_VALIDITY_MONTHS`: lifetime of newly issued cards
/// - `OVERDRAFT_LIMIT_CENTS`: overdraft ceiling given to accounts whose type
///   permits overdraft
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_routing_number")]
    pub routing_number: String,

    #[serde(default = "default_scheduler_tick_secs")]
    pub scheduler_tick_secs: u64,

    #[serde(default = "default_loan_default_threshold")]
    pub loan_default_threshold: u32,

    #[serde(default = "default_loan_exposure_multiplier")]
    pub loan_exposure_multiplier: i64,

    /// Which account the owner's "default" operations target. Resolution
    /// falls back to the first account found when none of the listed types
    /// exist.
    #[serde(default = "default_primary_account_order")]
    pub primary_account_order: Vec<AccountType>,

    #[serde(default = "default_card_validity_months")]
    pub card_validity_months: u32,

    #[serde(default = "default_overdraft_limit_cents")]
    pub overdraft_limit_cents: i64,
}

fn default_routing_number() -> String {
    "123456789".to_string()
}

fn default_scheduler_tick_secs() -> u64 {
    3600
}

fn default_loan_default_threshold() -> u32 {
    3
}

fn default_loan_exposure_multiplier() -> i64 {
    3
}

fn default_primary_account_order() -> Vec<AccountType> {
    vec![AccountType::Checking, AccountType::Wallet]
}

fn default_card_validity_months() -> u32 {
    36
}

fn default_overdraft_limit_cents() -> i64 {
    50_000
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable cannot be parsed into the expected
    /// type. Missing variables fall back to defaults.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routing_number: default_routing_number(),
            scheduler_tick_secs: default_scheduler_tick_secs(),
            loan_default_threshold: default_loan_default_threshold(),
            loan_exposure_multiplier: default_loan_exposure_multiplier(),
            primary_account_order: default_primary_account_order(),
            card_validity_months: default_card_validity_months(),
            overdraft_limit_cents: default_overdraft_limit_cents(),
        }
    }
}
