//! Transaction log service.
//!
//! Single responsibility: construct a [`Transaction`] for a balance mutation
//! that has already been authorized, persist it, and notify observers. No
//! business validation happens here — callers are trusted.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::events::{EventBus, Notification};
use crate::models::transaction::{
    SYSTEM_INITIATOR, Transaction, TransactionStatus, TransactionType,
};
use crate::services::numbers::NumberGenerator;
use crate::store::MemoryStore;

/// Default page size for history reads.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

pub struct TransactionService {
    store: Arc<MemoryStore>,
    numbers: Arc<NumberGenerator>,
    events: EventBus,
}

impl TransactionService {
    pub fn new(store: Arc<MemoryStore>, numbers: Arc<NumberGenerator>, events: EventBus) -> Self {
        Self {
            store,
            numbers,
            events,
        }
    }

    /// Build, persist, and announce one log entry.
    async fn record(
        &self,
        transaction_type: TransactionType,
        from_account: Option<&str>,
        to_account: Option<&str>,
        amount_cents: i64,
        fee_cents: i64,
        initiated_by: Uuid,
        description: String,
    ) -> Result<Transaction> {
        let now = Utc::now();
        let transaction = Transaction {
            transaction_id: self.numbers.transaction_id(),
            from_account: from_account.map(str::to_string),
            to_account: to_account.map(str::to_string),
            amount_cents,
            transaction_type,
            status: TransactionStatus::Completed,
            description,
            fee_cents,
            initiated_by,
            created_at: now,
            processed_at: Some(now),
        };

        self.store.create_transaction(transaction.clone()).await?;
        tracing::debug!(
            id = %transaction.transaction_id,
            kind = ?transaction.transaction_type,
            amount_cents,
            "transaction recorded"
        );
        self.events.publish(Notification::TransactionRecorded {
            transaction: transaction.clone(),
        });

        Ok(transaction)
    }

    fn describe(description: &str, fallback: &str) -> String {
        if description.is_empty() {
            fallback.to_string()
        } else {
            description.to_string()
        }
    }

    pub async fn record_deposit(
        &self,
        account_number: &str,
        amount_cents: i64,
        initiated_by: Uuid,
        description: &str,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::Deposit,
            None,
            Some(account_number),
            amount_cents,
            0,
            initiated_by,
            Self::describe(description, "Deposit"),
        )
        .await
    }

    pub async fn record_withdrawal(
        &self,
        account_number: &str,
        amount_cents: i64,
        initiated_by: Uuid,
        description: &str,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::Withdrawal,
            Some(account_number),
            None,
            amount_cents,
            0,
            initiated_by,
            Self::describe(description, "Withdrawal"),
        )
        .await
    }

    /// One entry carrying both account numbers; transfers are not recorded
    /// as offsetting postings.
    pub async fn record_transfer(
        &self,
        from_account: &str,
        to_account: &str,
        amount_cents: i64,
        initiated_by: Uuid,
        description: &str,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::Transfer,
            Some(from_account),
            Some(to_account),
            amount_cents,
            0,
            initiated_by,
            Self::describe(description, "Transfer"),
        )
        .await
    }

    pub async fn record_card_purchase(
        &self,
        account_number: &str,
        amount_cents: i64,
        initiated_by: Uuid,
        merchant_description: &str,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::CardPurchase,
            Some(account_number),
            None,
            amount_cents,
            0,
            initiated_by,
            Self::describe(merchant_description, "Card Purchase"),
        )
        .await
    }

    pub async fn record_atm_withdrawal(
        &self,
        account_number: &str,
        amount_cents: i64,
        fee_cents: i64,
        initiated_by: Uuid,
        atm_id: &str,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::AtmWithdrawal,
            Some(account_number),
            None,
            amount_cents,
            fee_cents,
            initiated_by,
            format!("ATM Withdrawal ({atm_id})"),
        )
        .await
    }

    pub async fn record_atm_deposit(
        &self,
        account_number: &str,
        amount_cents: i64,
        initiated_by: Uuid,
        atm_id: &str,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::AtmDeposit,
            None,
            Some(account_number),
            amount_cents,
            0,
            initiated_by,
            format!("ATM Deposit ({atm_id})"),
        )
        .await
    }

    pub async fn record_loan_disbursement(
        &self,
        account_number: &str,
        amount_cents: i64,
        loan_id: &str,
        initiated_by: Uuid,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::LoanDisbursement,
            None,
            Some(account_number),
            amount_cents,
            0,
            initiated_by,
            format!("Loan Disbursement ({loan_id})"),
        )
        .await
    }

    pub async fn record_loan_payment(
        &self,
        account_number: &str,
        amount_cents: i64,
        loan_id: &str,
        initiated_by: Uuid,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::LoanPayment,
            Some(account_number),
            None,
            amount_cents,
            0,
            initiated_by,
            format!("Loan Payment ({loan_id})"),
        )
        .await
    }

    pub async fn record_interest_credit(
        &self,
        account_number: &str,
        amount_cents: i64,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::InterestCredit,
            None,
            Some(account_number),
            amount_cents,
            0,
            SYSTEM_INITIATOR,
            "Interest Credit".to_string(),
        )
        .await
    }

    pub async fn record_fee_deduction(
        &self,
        account_number: &str,
        amount_cents: i64,
        fee_description: &str,
    ) -> Result<Transaction> {
        self.record(
            TransactionType::FeeDeduction,
            Some(account_number),
            None,
            amount_cents,
            0,
            SYSTEM_INITIATOR,
            fee_description.to_string(),
        )
        .await
    }

    // --- reads ---

    pub async fn transaction(&self, transaction_id: &str) -> Option<Transaction> {
        self.store.transaction(transaction_id).await
    }

    /// Account history, newest first.
    pub async fn history(&self, account_number: &str, limit: usize) -> Vec<Transaction> {
        self.store.transactions_by_account(account_number, limit).await
    }

    pub async fn by_initiator(&self, initiated_by: Uuid) -> Vec<Transaction> {
        self.store.transactions_by_initiator(initiated_by).await
    }
}
