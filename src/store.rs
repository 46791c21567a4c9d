//! In-process persistence store and the per-account lock registry.
//!
//! The store is the single source of truth for every entity. It exposes the
//! primitives the services need — create (rejecting unique-key collisions),
//! point lookups, lookups by owner/status, and closure-based single-row
//! updates that are atomic to the caller — and nothing else. No business
//! validation happens here.
//!
//! # Concurrency
//!
//! Row updates are individually atomic, but a read-then-write sequence is
//! not. Mutating services must serialize per row through the [`KeyedLocks`]
//! registries: one async mutex per account number (and per card number, loan
//! id, and device id), with two-account operations (transfers) acquiring
//! both locks in ascending account-number order so opposite-direction
//! transfers cannot deadlock. Unrelated rows proceed fully in parallel.
//! Where an operation spans a non-account row and an account (card spends,
//! loan payments, device withdrawals), the non-account lock is acquired
//! first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::models::account::{Account, AccountType};
use crate::models::atm::{Atm, Bank};
use crate::models::card::Card;
use crate::models::loan::{Loan, LoanStatus};
use crate::models::transaction::Transaction;

/// One async mutex per key (account number, card number, loan id, or device
/// id).
///
/// Lock entries are created lazily and removed when the row they guard is
/// deleted; callers must verify the row exists before minting an entry. The
/// registry map itself is guarded by a std mutex because it is only held for
/// a map lookup, never across an await.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Serialize on a single key.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.handle(key).lock_owned().await
    }

    /// Serialize on two keys, acquiring in ascending order regardless of
    /// argument order.
    pub async fn lock_pair(
        &self,
        a: &str,
        b: &str,
    ) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first_guard = self.handle(first).lock_owned().await;
        let second_guard = self.handle(second).lock_owned().await;
        (first_guard, second_guard)
    }

    /// Drop the entry for a deleted row. A guard already held stays valid;
    /// the entry just becomes unreachable for new lock attempts.
    pub fn remove(&self, key: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory row store for all five entity families plus the bank registry.
///
/// Shared between services as `Arc<MemoryStore>`; constructed once at
/// startup and injected explicitly.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    /// Append-only; insertion order is creation order.
    transactions: RwLock<Vec<Transaction>>,
    cards: RwLock<HashMap<String, Card>>,
    loans: RwLock<HashMap<String, Loan>>,
    atms: RwLock<HashMap<String, Atm>>,
    banks: RwLock<HashMap<String, Bank>>,
    locks: KeyedLocks,
    card_locks: KeyedLocks,
    loan_locks: KeyedLocks,
    atm_locks: KeyedLocks,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-account serialization registry.
    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// The per-card serialization registry.
    pub fn card_locks(&self) -> &KeyedLocks {
        &self.card_locks
    }

    /// The per-loan serialization registry.
    pub fn loan_locks(&self) -> &KeyedLocks {
        &self.loan_locks
    }

    /// The per-device serialization registry.
    pub fn atm_locks(&self) -> &KeyedLocks {
        &self.atm_locks
    }

    // --- accounts ---

    pub async fn create_account(&self, account: Account) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.account_number) {
            return Err(LedgerError::DuplicateRecord);
        }
        accounts.insert(account.account_number.clone(), account);
        Ok(())
    }

    pub async fn account(&self, account_number: &str) -> Result<Account> {
        self.accounts
            .read()
            .await
            .get(account_number)
            .cloned()
            .ok_or(LedgerError::AccountNotFound)
    }

    pub async fn accounts_by_owner(&self, owner: Uuid) -> Vec<Account> {
        let mut found: Vec<Account> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        found
    }

    pub async fn account_by_owner_and_type(
        &self,
        owner: Uuid,
        account_type: AccountType,
    ) -> Option<Account> {
        let mut found: Vec<Account> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.owner == owner && a.account_type == account_type)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        found.into_iter().next()
    }

    pub async fn all_account_numbers(&self) -> Vec<String> {
        self.accounts.read().await.keys().cloned().collect()
    }

    /// Apply `mutate` to one account row atomically and return the updated
    /// row. `updated_at` is stamped after the closure runs.
    pub async fn update_account<F>(&self, account_number: &str, mutate: F) -> Result<Account>
    where
        F: FnOnce(&mut Account),
    {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(account_number)
            .ok_or(LedgerError::AccountNotFound)?;
        mutate(account);
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    pub async fn delete_account(&self, account_number: &str) -> Result<()> {
        self.accounts
            .write()
            .await
            .remove(account_number)
            .ok_or(LedgerError::AccountNotFound)?;
        self.locks.remove(account_number);
        Ok(())
    }

    // --- transactions ---

    pub async fn create_transaction(&self, transaction: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        if transactions
            .iter()
            .any(|t| t.transaction_id == transaction.transaction_id)
        {
            return Err(LedgerError::DuplicateRecord);
        }
        transactions.push(transaction);
        Ok(())
    }

    pub async fn transaction(&self, transaction_id: &str) -> Option<Transaction> {
        self.transactions
            .read()
            .await
            .iter()
            .find(|t| t.transaction_id == transaction_id)
            .cloned()
    }

    /// Entries touching the account, newest first, capped at `limit`.
    pub async fn transactions_by_account(
        &self,
        account_number: &str,
        limit: usize,
    ) -> Vec<Transaction> {
        self.transactions
            .read()
            .await
            .iter()
            .rev()
            .filter(|t| {
                t.from_account.as_deref() == Some(account_number)
                    || t.to_account.as_deref() == Some(account_number)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn transactions_by_initiator(&self, initiated_by: Uuid) -> Vec<Transaction> {
        self.transactions
            .read()
            .await
            .iter()
            .rev()
            .filter(|t| t.initiated_by == initiated_by)
            .cloned()
            .collect()
    }

    // --- cards ---

    pub async fn create_card(&self, card: Card) -> Result<()> {
        let mut cards = self.cards.write().await;
        if cards.contains_key(&card.card_number) {
            return Err(LedgerError::DuplicateRecord);
        }
        cards.insert(card.card_number.clone(), card);
        Ok(())
    }

    pub async fn card(&self, card_number: &str) -> Result<Card> {
        self.cards
            .read()
            .await
            .get(card_number)
            .cloned()
            .ok_or(LedgerError::CardNotFound)
    }

    pub async fn cards_by_owner(&self, owner: Uuid) -> Vec<Card> {
        self.cards
            .read()
            .await
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect()
    }

    pub async fn cards_by_account(&self, account_number: &str) -> Vec<Card> {
        self.cards
            .read()
            .await
            .values()
            .filter(|c| c.linked_account == account_number)
            .cloned()
            .collect()
    }

    pub async fn update_card<F>(&self, card_number: &str, mutate: F) -> Result<Card>
    where
        F: FnOnce(&mut Card),
    {
        let mut cards = self.cards.write().await;
        let card = cards.get_mut(card_number).ok_or(LedgerError::CardNotFound)?;
        mutate(card);
        Ok(card.clone())
    }

    // --- loans ---

    pub async fn create_loan(&self, loan: Loan) -> Result<()> {
        let mut loans = self.loans.write().await;
        if loans.contains_key(&loan.loan_id) {
            return Err(LedgerError::DuplicateRecord);
        }
        loans.insert(loan.loan_id.clone(), loan);
        Ok(())
    }

    pub async fn loan(&self, loan_id: &str) -> Result<Loan> {
        self.loans
            .read()
            .await
            .get(loan_id)
            .cloned()
            .ok_or(LedgerError::LoanNotFound)
    }

    pub async fn loans_by_borrower(&self, borrower: Uuid) -> Vec<Loan> {
        self.loans
            .read()
            .await
            .values()
            .filter(|l| l.borrower == borrower)
            .cloned()
            .collect()
    }

    pub async fn loans_by_status(&self, status: LoanStatus) -> Vec<Loan> {
        self.loans
            .read()
            .await
            .values()
            .filter(|l| l.status == status)
            .cloned()
            .collect()
    }

    pub async fn active_loans_by_borrower(&self, borrower: Uuid) -> Vec<Loan> {
        self.loans
            .read()
            .await
            .values()
            .filter(|l| l.borrower == borrower && l.status == LoanStatus::Active)
            .cloned()
            .collect()
    }

    pub async fn overdue_loans(&self, now: DateTime<Utc>) -> Vec<Loan> {
        self.loans
            .read()
            .await
            .values()
            .filter(|l| l.is_overdue(now))
            .cloned()
            .collect()
    }

    pub async fn update_loan<F>(&self, loan_id: &str, mutate: F) -> Result<Loan>
    where
        F: FnOnce(&mut Loan),
    {
        let mut loans = self.loans.write().await;
        let loan = loans.get_mut(loan_id).ok_or(LedgerError::LoanNotFound)?;
        mutate(loan);
        Ok(loan.clone())
    }

    // --- ATMs ---

    /// Rejects both duplicate device ids and a second device at the same
    /// placement.
    pub async fn create_atm(&self, atm: Atm) -> Result<()> {
        let mut atms = self.atms.write().await;
        if atms.contains_key(&atm.atm_id) || atms.values().any(|a| a.placement == atm.placement) {
            return Err(LedgerError::DuplicateRecord);
        }
        atms.insert(atm.atm_id.clone(), atm);
        Ok(())
    }

    pub async fn atm(&self, atm_id: &str) -> Result<Atm> {
        self.atms
            .read()
            .await
            .get(atm_id)
            .cloned()
            .ok_or(LedgerError::AtmNotFound)
    }

    pub async fn atm_by_placement(&self, placement: &str) -> Option<Atm> {
        self.atms
            .read()
            .await
            .values()
            .find(|a| a.placement == placement)
            .cloned()
    }

    pub async fn atms_by_bank(&self, bank_id: &str) -> Vec<Atm> {
        self.atms
            .read()
            .await
            .values()
            .filter(|a| a.bank_id == bank_id)
            .cloned()
            .collect()
    }

    pub async fn active_atms(&self) -> Vec<Atm> {
        self.atms
            .read()
            .await
            .values()
            .filter(|a| a.active)
            .cloned()
            .collect()
    }

    pub async fn update_atm<F>(&self, atm_id: &str, mutate: F) -> Result<Atm>
    where
        F: FnOnce(&mut Atm),
    {
        let mut atms = self.atms.write().await;
        let atm = atms.get_mut(atm_id).ok_or(LedgerError::AtmNotFound)?;
        mutate(atm);
        Ok(atm.clone())
    }

    pub async fn delete_atm(&self, atm_id: &str) -> Result<()> {
        self.atms
            .write()
            .await
            .remove(atm_id)
            .ok_or(LedgerError::AtmNotFound)?;
        self.atm_locks.remove(atm_id);
        Ok(())
    }

    // --- banks ---

    pub async fn create_bank(&self, bank: Bank) -> Result<()> {
        let mut banks = self.banks.write().await;
        if banks.contains_key(&bank.bank_id) {
            return Err(LedgerError::DuplicateRecord);
        }
        banks.insert(bank.bank_id.clone(), bank);
        Ok(())
    }

    pub async fn bank(&self, bank_id: &str) -> Result<Bank> {
        self.banks
            .read()
            .await
            .get(bank_id)
            .cloned()
            .ok_or(LedgerError::BankNotFound)
    }

    pub async fn update_bank<F>(&self, bank_id: &str, mutate: F) -> Result<Bank>
    where
        F: FnOnce(&mut Bank),
    {
        let mut banks = self.banks.write().await;
        let bank = banks.get_mut(bank_id).ok_or(LedgerError::BankNotFound)?;
        mutate(bank);
        Ok(bank.clone())
    }

    pub async fn is_bank_member(&self, owner: Uuid, bank_id: &str) -> bool {
        self.banks
            .read()
            .await
            .get(bank_id)
            .is_some_and(|b| b.members.contains(&owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::AccountType;

    fn account(number: &str, owner: Uuid) -> Account {
        let now = Utc::now();
        Account {
            account_number: number.to_string(),
            routing_number: "123456789".to_string(),
            owner,
            account_type: AccountType::Wallet,
            balance_cents: 0,
            frozen: false,
            overdraft_limit_cents: 0,
            daily_withdrawn_cents: 0,
            last_withdrawal_date: now.date_naive(),
            account_name: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_account_numbers() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.create_account(account("1", owner)).await.unwrap();
        assert_eq!(
            store.create_account(account("1", owner)).await,
            Err(LedgerError::DuplicateRecord)
        );
    }

    #[tokio::test]
    async fn update_stamps_updated_at() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.create_account(account("1", owner)).await.unwrap();
        let before = store.account("1").await.unwrap().updated_at;
        let after = store
            .update_account("1", |a| a.balance_cents = 42)
            .await
            .unwrap();
        assert_eq!(after.balance_cents, 42);
        assert!(after.updated_at >= before);
    }

    #[tokio::test]
    async fn lock_pair_is_order_insensitive() {
        let locks = KeyedLocks::default();
        // Acquiring (a, b) then dropping must allow (b, a) to proceed
        let guards = locks.lock_pair("a", "b").await;
        drop(guards);
        let _guards = locks.lock_pair("b", "a").await;
    }

    #[tokio::test]
    async fn transactions_read_newest_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        for i in 0..3 {
            store
                .create_transaction(Transaction {
                    transaction_id: format!("TXN{i}"),
                    from_account: Some("1".to_string()),
                    to_account: None,
                    amount_cents: 100,
                    transaction_type: crate::models::transaction::TransactionType::Withdrawal,
                    status: crate::models::transaction::TransactionStatus::Completed,
                    description: String::new(),
                    fee_cents: 0,
                    initiated_by: owner,
                    created_at: Utc::now(),
                    processed_at: None,
                })
                .await
                .unwrap();
        }
        let listed = store.transactions_by_account("1", 2).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].transaction_id, "TXN2");
        assert_eq!(listed[1].transaction_id, "TXN1");
    }
}
