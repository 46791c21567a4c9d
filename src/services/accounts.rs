//! Account ledger service.
//!
//! Owns every balance-mutation rule. All money movement in the crate funnels
//! through the debit/credit primitives here; the card, loan, ATM, and
//! scheduler services never touch balances directly.
//!
//! Every mutating operation serializes on the account's lock before reading,
//! so the read-check-write sequence is atomic per account. Transfers hold
//! both locks, acquired in ascending account-number order, for the whole
//! compensating-write protocol.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::events::{EventBus, Notification};
use crate::models::account::{Account, AccountType, WithdrawalResult};
use crate::models::transaction::Transaction;
use crate::services::numbers::NumberGenerator;
use crate::services::transactions::TransactionService;
use crate::store::MemoryStore;

/// Outcome of a transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferResult {
    Success,
    InvalidAmount,
    SameAccount,
    FromAccountNotFound,
    ToAccountNotFound,
    FromAccountFrozen,
    ToAccountFrozen,
    InsufficientFunds,
    DailyLimitExceeded,
    /// A write failed mid-protocol; the debit was reversed.
    Failed,
}

pub struct AccountService {
    store: Arc<MemoryStore>,
    numbers: Arc<NumberGenerator>,
    transactions: Arc<TransactionService>,
    events: EventBus,
    primary_order: Vec<AccountType>,
    overdraft_limit_cents: i64,
}

impl AccountService {
    pub fn new(
        store: Arc<MemoryStore>,
        numbers: Arc<NumberGenerator>,
        transactions: Arc<TransactionService>,
        events: EventBus,
        config: &Config,
    ) -> Self {
        Self {
            store,
            numbers,
            transactions,
            events,
            primary_order: config.primary_account_order.clone(),
            overdraft_limit_cents: config.overdraft_limit_cents,
        }
    }

    /// Open a new account, optionally seeding it with an initial deposit.
    ///
    /// Non-wallet types are unique per owner; a second checking account for
    /// the same owner fails with [`LedgerError::DuplicateAccount`]. Wallets
    /// may be held in multiples.
    pub async fn open_account(
        &self,
        owner: Uuid,
        account_type: AccountType,
        initial_deposit_cents: i64,
        account_name: &str,
    ) -> Result<Account> {
        if initial_deposit_cents < 0 {
            return Err(LedgerError::InvalidRequest(
                "initial deposit must not be negative".to_string(),
            ));
        }

        if account_type != AccountType::Wallet
            && self
                .store
                .account_by_owner_and_type(owner, account_type)
                .await
                .is_some()
        {
            return Err(LedgerError::DuplicateAccount);
        }

        let now = Utc::now();
        let account = Account {
            account_number: self.numbers.account_number(),
            routing_number: self.numbers.routing_number().to_string(),
            owner,
            account_type,
            balance_cents: initial_deposit_cents,
            frozen: false,
            overdraft_limit_cents: if account_type.allows_overdraft() {
                self.overdraft_limit_cents
            } else {
                0
            },
            daily_withdrawn_cents: 0,
            last_withdrawal_date: now.date_naive(),
            account_name: if account_name.is_empty() {
                account_type.display_name().to_string()
            } else {
                account_name.to_string()
            },
            created_at: now,
            updated_at: now,
        };

        self.store.create_account(account.clone()).await?;
        tracing::info!(
            account = %account.account_number,
            kind = ?account_type,
            %owner,
            "account opened"
        );
        self.events.publish(Notification::AccountCreated {
            account: account.clone(),
        });

        if initial_deposit_cents > 0 {
            self.transactions
                .record_deposit(
                    &account.account_number,
                    initial_deposit_cents,
                    owner,
                    "Initial deposit",
                )
                .await?;
        }

        Ok(account)
    }

    /// Credit an account and record a deposit.
    ///
    /// Each call appends a fresh transaction; deposits are not idempotent,
    /// so a caller-side retry after an ambiguous failure can double-apply.
    pub async fn deposit(
        &self,
        account_number: &str,
        amount_cents: i64,
        initiated_by: Uuid,
        description: &str,
    ) -> Result<Transaction> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidRequest(
                "deposit amount must be positive".to_string(),
            ));
        }

        // Existence check before locking, so unknown numbers never mint a
        // lock-registry entry. The post-lock read stays authoritative.
        self.store.account(account_number).await?;
        let _guard = self.store.locks().lock(account_number).await;

        let account = self.store.account(account_number).await?;
        if account.frozen {
            return Err(LedgerError::AccountFrozen);
        }

        self.store
            .update_account(account_number, |a| a.balance_cents += amount_cents)
            .await?;

        self.transactions
            .record_deposit(account_number, amount_cents, initiated_by, description)
            .await
    }

    /// Withdraw from an account, recording a withdrawal on success.
    ///
    /// Checks run in order: frozen flag, daily ceiling, available balance
    /// (including overdraft headroom where the type permits it).
    pub async fn withdraw(
        &self,
        account_number: &str,
        amount_cents: i64,
        initiated_by: Uuid,
        description: &str,
    ) -> Result<WithdrawalResult> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidRequest(
                "withdrawal amount must be positive".to_string(),
            ));
        }

        self.store.account(account_number).await?;
        let _guard = self.store.locks().lock(account_number).await;

        let outcome = self
            .debit_holding_lock(account_number, amount_cents, true)
            .await?;
        if outcome == WithdrawalResult::Success {
            self.transactions
                .record_withdrawal(account_number, amount_cents, initiated_by, description)
                .await?;
        }
        Ok(outcome)
    }

    /// Move money between two accounts.
    ///
    /// Both accounts are read fresh under their locks immediately before
    /// mutation. Write order is debit-then-credit; if the credit fails the
    /// debit is reversed (compensating write) and [`TransferResult::Failed`]
    /// is returned. On success exactly one transaction referencing both
    /// accounts is recorded and the source's daily tally advances.
    pub async fn transfer(
        &self,
        from_account: &str,
        to_account: &str,
        amount_cents: i64,
        initiated_by: Uuid,
        description: &str,
    ) -> Result<TransferResult> {
        if amount_cents <= 0 {
            return Ok(TransferResult::InvalidAmount);
        }
        if from_account == to_account {
            return Ok(TransferResult::SameAccount);
        }

        // Resolve both accounts before locking; unknown numbers must not
        // mint lock-registry entries.
        if self.store.account(from_account).await.is_err() {
            return Ok(TransferResult::FromAccountNotFound);
        }
        if self.store.account(to_account).await.is_err() {
            return Ok(TransferResult::ToAccountNotFound);
        }

        let _guards = self.store.locks().lock_pair(from_account, to_account).await;

        let from = match self.store.account(from_account).await {
            Ok(a) => a,
            Err(LedgerError::AccountNotFound) => return Ok(TransferResult::FromAccountNotFound),
            Err(e) => return Err(e),
        };
        let to = match self.store.account(to_account).await {
            Ok(a) => a,
            Err(LedgerError::AccountNotFound) => return Ok(TransferResult::ToAccountNotFound),
            Err(e) => return Err(e),
        };

        if from.frozen {
            return Ok(TransferResult::FromAccountFrozen);
        }
        if to.frozen {
            return Ok(TransferResult::ToAccountFrozen);
        }

        // Transfers count toward the source's daily withdrawal ceiling
        let today = Utc::now().date_naive();
        if let Some(max_daily) = from.account_type.max_daily_withdrawal_cents() {
            if from.daily_withdrawn_on(today) + amount_cents > max_daily {
                return Ok(TransferResult::DailyLimitExceeded);
            }
        }

        let new_from_balance = from.balance_cents - amount_cents;
        if new_from_balance < from.min_allowed_balance_cents() {
            return Ok(TransferResult::InsufficientFunds);
        }

        // Debit source, then credit destination; reverse the debit if the
        // credit does not land.
        if self
            .store
            .update_account(from_account, |a| a.balance_cents = new_from_balance)
            .await
            .is_err()
        {
            return Ok(TransferResult::Failed);
        }

        if let Err(e) = self
            .store
            .update_account(to_account, |a| a.balance_cents += amount_cents)
            .await
        {
            tracing::warn!(
                from = from_account,
                to = to_account,
                amount_cents,
                error = %e,
                "transfer credit failed; reversing debit"
            );
            let _ = self
                .store
                .update_account(from_account, |a| a.balance_cents = from.balance_cents)
                .await;
            return Ok(TransferResult::Failed);
        }

        let new_tally = from.daily_withdrawn_on(today) + amount_cents;
        self.store
            .update_account(from_account, |a| {
                a.daily_withdrawn_cents = new_tally;
                a.last_withdrawal_date = today;
            })
            .await?;

        self.transactions
            .record_transfer(from_account, to_account, amount_cents, initiated_by, description)
            .await?;

        Ok(TransferResult::Success)
    }

    /// Freeze an account. Idempotent: freezing a frozen account succeeds
    /// without side effects.
    pub async fn freeze_account(&self, account_number: &str) -> Result<()> {
        self.store
            .update_account(account_number, |a| a.frozen = true)
            .await?;
        tracing::info!(account = account_number, "account frozen");
        Ok(())
    }

    /// Unfreeze an account. Idempotent.
    pub async fn unfreeze_account(&self, account_number: &str) -> Result<()> {
        self.store
            .update_account(account_number, |a| a.frozen = false)
            .await?;
        tracing::info!(account = account_number, "account unfrozen");
        Ok(())
    }

    /// Delete an account with an exactly-zero balance. Accounts holding any
    /// money, positive or overdrawn, cannot be closed.
    pub async fn close_account(&self, account_number: &str) -> Result<()> {
        self.store.account(account_number).await?;
        let _guard = self.store.locks().lock(account_number).await;

        let account = self.store.account(account_number).await?;
        if account.balance_cents != 0 {
            return Err(LedgerError::InvalidRequest(
                "account balance must be zero to close".to_string(),
            ));
        }
        self.store.delete_account(account_number).await
    }

    // --- reads ---

    pub async fn account(&self, account_number: &str) -> Result<Account> {
        self.store.account(account_number).await
    }

    pub async fn balance(&self, account_number: &str) -> Result<i64> {
        Ok(self.store.account(account_number).await?.balance_cents)
    }

    pub async fn available_balance(&self, account_number: &str) -> Result<i64> {
        Ok(self
            .store
            .account(account_number)
            .await?
            .available_balance_cents())
    }

    pub async fn accounts_by_owner(&self, owner: Uuid) -> Vec<Account> {
        self.store.accounts_by_owner(owner).await
    }

    pub async fn total_balance(&self, owner: Uuid) -> i64 {
        self.store
            .accounts_by_owner(owner)
            .await
            .iter()
            .map(|a| a.balance_cents)
            .sum()
    }

    /// The account an owner's default operations target, resolved through
    /// the configured preference order and falling back to the first
    /// account found.
    pub async fn primary_account(&self, owner: Uuid) -> Option<Account> {
        for account_type in &self.primary_order {
            if let Some(account) = self
                .store
                .account_by_owner_and_type(owner, *account_type)
                .await
            {
                return Some(account);
            }
        }
        self.store.accounts_by_owner(owner).await.into_iter().next()
    }

    pub async fn wallet(&self, owner: Uuid) -> Option<Account> {
        self.store
            .account_by_owner_and_type(owner, AccountType::Wallet)
            .await
    }

    /// Lazy-provisioning entry point: return the owner's wallet, creating an
    /// empty one if none exists.
    pub async fn ensure_wallet_exists(&self, owner: Uuid) -> Result<Account> {
        match self.wallet(owner).await {
            Some(existing) => Ok(existing),
            None => {
                self.open_account(owner, AccountType::Wallet, 0, "Personal Wallet")
                    .await
            }
        }
    }

    // --- debit/credit primitives for collaborating services ---

    /// Credit an account unconditionally (collaborators perform their own
    /// frozen checks where their rules require one). Records nothing; the
    /// caller logs the mutation under its own category.
    pub async fn credit(&self, account_number: &str, amount_cents: i64) -> Result<Account> {
        self.store.account(account_number).await?;
        let _guard = self.store.locks().lock(account_number).await;
        self.store
            .update_account(account_number, |a| a.balance_cents += amount_cents)
            .await
    }

    /// Run the full withdrawal rule set and debit on success. Records
    /// nothing. `advance_tally` controls whether the amount counts toward
    /// the account's daily ceiling going forward; the ceiling is always
    /// checked.
    pub async fn apply_debit(
        &self,
        account_number: &str,
        amount_cents: i64,
        advance_tally: bool,
    ) -> Result<WithdrawalResult> {
        self.store.account(account_number).await?;
        let _guard = self.store.locks().lock(account_number).await;
        self.debit_holding_lock(account_number, amount_cents, advance_tally)
            .await
    }

    /// Debit against the plain balance only, bypassing frozen, daily-limit,
    /// and overdraft rules. Used by loan repayment and scheduled fees, which
    /// do not count as withdrawals.
    pub async fn force_debit(&self, account_number: &str, amount_cents: i64) -> Result<Account> {
        self.store.account(account_number).await?;
        let _guard = self.store.locks().lock(account_number).await;

        let account = self.store.account(account_number).await?;
        if account.balance_cents < amount_cents {
            return Err(LedgerError::InsufficientFunds);
        }
        self.store
            .update_account(account_number, |a| a.balance_cents -= amount_cents)
            .await
    }

    /// Shared debit path; the caller must already hold the account's lock.
    async fn debit_holding_lock(
        &self,
        account_number: &str,
        amount_cents: i64,
        advance_tally: bool,
    ) -> Result<WithdrawalResult> {
        let account = self.store.account(account_number).await?;
        let today = Utc::now().date_naive();

        let check = account.check_withdrawal(amount_cents, today);
        if check != WithdrawalResult::Success {
            return Ok(check);
        }

        let new_balance = account.balance_cents - amount_cents;
        // Re-derived guard; check_withdrawal already enforced this
        if new_balance < account.min_allowed_balance_cents() {
            return Ok(WithdrawalResult::InsufficientFunds);
        }

        let new_tally = account.daily_withdrawn_on(today) + amount_cents;
        self.store
            .update_account(account_number, |a| {
                a.balance_cents = new_balance;
                if advance_tally {
                    a.daily_withdrawn_cents = new_tally;
                    a.last_withdrawal_date = today;
                }
            })
            .await?;

        Ok(WithdrawalResult::Success)
    }
}
