//! Cash dispenser service.
//!
//! Layers the device-side cash reserve and fee model on top of the account
//! ledger service. Withdrawals debit `amount + fee` from the account through
//! the ledger's withdraw path but only decrement the device's reserve by the
//! dispensed amount — the fee stays in the ledger, credited to the owning
//! bank's reserves for bank-owned devices.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::models::account::WithdrawalResult;
use crate::models::atm::{Atm, AtmCheck, Bank, SYSTEM_BANK};
use crate::services::accounts::AccountService;
use crate::services::numbers::NumberGenerator;
use crate::services::transactions::TransactionService;
use crate::store::MemoryStore;

/// Outcome of an ATM withdrawal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AtmWithdrawResult {
    /// Cash dispensed; `fee_cents` was charged on top of `amount_cents`.
    Success { amount_cents: i64, fee_cents: i64 },
    AtmOffline,
    ExceedsAtmLimit,
    InsufficientAtmCash,
    AccountFrozen,
    DailyLimitExceeded,
    /// The account cannot cover amount plus fee.
    InsufficientFunds,
}

/// Outcome of an ATM deposit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AtmDepositResult {
    Success { amount_cents: i64 },
    AtmOffline,
    AccountFrozen,
}

pub struct AtmService {
    store: Arc<MemoryStore>,
    numbers: Arc<NumberGenerator>,
    accounts: Arc<AccountService>,
    transactions: Arc<TransactionService>,
}

impl AtmService {
    pub fn new(
        store: Arc<MemoryStore>,
        numbers: Arc<NumberGenerator>,
        accounts: Arc<AccountService>,
        transactions: Arc<TransactionService>,
    ) -> Self {
        Self {
            store,
            numbers,
            accounts,
            transactions,
        }
    }

    /// Place a system-owned device.
    pub async fn create_atm(&self, placement: &str, placed_by: Uuid) -> Result<Atm> {
        self.create_atm_for_bank(placement, placed_by, SYSTEM_BANK).await
    }

    /// Place a device owned by a specific bank. At most one device may exist
    /// per placement.
    pub async fn create_atm_for_bank(
        &self,
        placement: &str,
        placed_by: Uuid,
        bank_id: &str,
    ) -> Result<Atm> {
        if self.store.atm_by_placement(placement).await.is_some() {
            return Err(LedgerError::DuplicateRecord);
        }
        if bank_id != SYSTEM_BANK {
            // Owning bank must be registered before it can place devices
            self.store.bank(bank_id).await?;
        }

        let atm = Atm {
            atm_id: self.numbers.atm_id(),
            placement: placement.to_string(),
            bank_id: bank_id.to_string(),
            cash_cents: 10_000_000,
            max_withdrawal_cents: 500_000,
            transaction_fee_cents: 250,
            out_of_network_fee_cents: 500,
            active: true,
            placed_by,
            created_at: Utc::now(),
        };
        self.store.create_atm(atm.clone()).await?;
        tracing::info!(atm = %atm.atm_id, bank = bank_id, placement, "ATM placed");
        Ok(atm)
    }

    /// Register a bank in the minimal registry backing the fee model.
    pub async fn register_bank(&self, bank_id: &str, name: &str) -> Result<Bank> {
        let bank = Bank {
            bank_id: bank_id.to_string(),
            name: name.to_string(),
            reserves_cents: 0,
            members: HashSet::new(),
        };
        self.store.create_bank(bank.clone()).await?;
        Ok(bank)
    }

    pub async fn add_bank_member(&self, bank_id: &str, member: Uuid) -> Result<()> {
        self.store
            .update_bank(bank_id, |b| {
                b.members.insert(member);
            })
            .await?;
        Ok(())
    }

    /// System devices treat everyone as a member.
    pub async fn is_member(&self, owner: Uuid, bank_id: &str) -> bool {
        bank_id == SYSTEM_BANK || self.store.is_bank_member(owner, bank_id).await
    }

    /// The fee `requester` would pay at this device right now.
    pub async fn fee_for(&self, atm: &Atm, requester: Uuid) -> i64 {
        let member = self.is_member(requester, &atm.bank_id).await;
        atm.total_fee_cents(member)
    }

    /// Dispense cash against an account the requester owns.
    ///
    /// Device checks run first (active, single-withdrawal ceiling, cash
    /// reserve), then ownership, then the account-side debit of
    /// `amount + fee` through the ledger's withdraw path. The device reserve
    /// drops by the dispensed amount only; the fee is credited to the owning
    /// bank's reserves unless the device is system-owned.
    pub async fn withdraw(
        &self,
        atm_id: &str,
        account_number: &str,
        amount_cents: i64,
        requester: Uuid,
    ) -> Result<AtmWithdrawResult> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidRequest(
                "withdrawal amount must be positive".to_string(),
            ));
        }

        self.store.atm(atm_id).await?;

        // Serialize per device: the reserve check and the reserve decrement
        // below must not interleave with a concurrent withdrawal. The device
        // lock is always taken before the account lock inside `apply_debit`.
        let _guard = self.store.atm_locks().lock(atm_id).await;
        let atm = self.store.atm(atm_id).await?;
        match atm.check_dispense(amount_cents) {
            AtmCheck::Ok => {}
            AtmCheck::Offline => return Ok(AtmWithdrawResult::AtmOffline),
            AtmCheck::ExceedsLimit => return Ok(AtmWithdrawResult::ExceedsAtmLimit),
            AtmCheck::InsufficientCash => return Ok(AtmWithdrawResult::InsufficientAtmCash),
        }

        let account = self.store.account(account_number).await?;
        if account.owner != requester {
            return Err(LedgerError::NotAccountOwner);
        }

        let fee_cents = self.fee_for(&atm, requester).await;
        let total = amount_cents + fee_cents;

        match self.accounts.apply_debit(account_number, total, true).await? {
            WithdrawalResult::Success => {}
            WithdrawalResult::AccountFrozen => return Ok(AtmWithdrawResult::AccountFrozen),
            WithdrawalResult::DailyLimitExceeded => {
                return Ok(AtmWithdrawResult::DailyLimitExceeded);
            }
            WithdrawalResult::InsufficientFunds => {
                return Ok(AtmWithdrawResult::InsufficientFunds);
            }
        }

        self.store
            .update_atm(atm_id, |a| a.cash_cents -= amount_cents)
            .await?;

        if !atm.is_system() && fee_cents > 0 {
            self.store
                .update_bank(&atm.bank_id, |b| b.reserves_cents += fee_cents)
                .await?;
        }

        self.transactions
            .record_atm_withdrawal(account_number, amount_cents, fee_cents, requester, atm_id)
            .await?;

        Ok(AtmWithdrawResult::Success {
            amount_cents,
            fee_cents,
        })
    }

    /// Accept cash into an account the requester owns. No fee; the device's
    /// reserve grows by the deposited amount.
    pub async fn deposit(
        &self,
        atm_id: &str,
        account_number: &str,
        amount_cents: i64,
        requester: Uuid,
    ) -> Result<AtmDepositResult> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidRequest(
                "deposit amount must be positive".to_string(),
            ));
        }

        self.store.atm(atm_id).await?;
        let _guard = self.store.atm_locks().lock(atm_id).await;
        let atm = self.store.atm(atm_id).await?;
        if !atm.active {
            return Ok(AtmDepositResult::AtmOffline);
        }

        let account = self.store.account(account_number).await?;
        if account.owner != requester {
            return Err(LedgerError::NotAccountOwner);
        }
        if account.frozen {
            return Ok(AtmDepositResult::AccountFrozen);
        }

        self.accounts.credit(account_number, amount_cents).await?;
        self.store
            .update_atm(atm_id, |a| a.cash_cents += amount_cents)
            .await?;

        self.transactions
            .record_atm_deposit(account_number, amount_cents, requester, atm_id)
            .await?;

        Ok(AtmDepositResult::Success { amount_cents })
    }

    // --- device lifecycle ---

    pub async fn refill(&self, atm_id: &str, amount_cents: i64) -> Result<Atm> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidRequest(
                "refill amount must be positive".to_string(),
            ));
        }
        self.store
            .update_atm(atm_id, |a| a.cash_cents += amount_cents)
            .await
    }

    pub async fn set_active(&self, atm_id: &str, active: bool) -> Result<Atm> {
        self.store.update_atm(atm_id, |a| a.active = active).await
    }

    pub async fn update_fees(
        &self,
        atm_id: &str,
        transaction_fee_cents: i64,
        out_of_network_fee_cents: i64,
    ) -> Result<Atm> {
        self.store
            .update_atm(atm_id, |a| {
                a.transaction_fee_cents = transaction_fee_cents;
                a.out_of_network_fee_cents = out_of_network_fee_cents;
            })
            .await
    }

    pub async fn remove(&self, atm_id: &str) -> Result<()> {
        self.store.delete_atm(atm_id).await
    }

    // --- reads ---

    pub async fn atm(&self, atm_id: &str) -> Result<Atm> {
        self.store.atm(atm_id).await
    }

    pub async fn atm_at(&self, placement: &str) -> Option<Atm> {
        self.store.atm_by_placement(placement).await
    }

    pub async fn atms_by_bank(&self, bank_id: &str) -> Vec<Atm> {
        self.store.atms_by_bank(bank_id).await
    }

    pub async fn active_atms(&self) -> Vec<Atm> {
        self.store.active_atms().await
    }

    pub async fn bank(&self, bank_id: &str) -> Result<Bank> {
        self.store.bank(bank_id).await
    }
}
