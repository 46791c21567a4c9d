use uuid::Uuid;

use ledger_core::models::account::{Account, AccountType};
use ledger_core::{Config, Services};

/// A fully wired service graph over a fresh in-memory store.
pub fn services() -> Services {
    Services::new(&Config::default())
}

/// Open an account funded with `balance_cents` for a fresh owner.
pub async fn funded_account(
    services: &Services,
    account_type: AccountType,
    balance_cents: i64,
) -> (Uuid, Account) {
    let owner = Uuid::new_v4();
    let account = services
        .accounts
        .open_account(owner, account_type, balance_cents, "")
        .await
        .expect("open account");
    (owner, account)
}
