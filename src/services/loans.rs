//! Loan origination, disbursement, repayment, and the default sweep.
//!
//! The state machine lives here: Pending → Approved → Active → PaidOff, with
//! Rejected and Cancelled leaving Pending and Defaulted leaving Active.
//! Disbursement and repayment move money exclusively through the account
//! ledger service.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::events::{EventBus, Notification};
use crate::models::loan::{Loan, LoanStatus, LoanType, monthly_payment_cents};
use crate::services::accounts::AccountService;
use crate::services::numbers::NumberGenerator;
use crate::services::transactions::TransactionService;
use crate::store::MemoryStore;

pub struct LoanService {
    store: Arc<MemoryStore>,
    numbers: Arc<NumberGenerator>,
    accounts: Arc<AccountService>,
    transactions: Arc<TransactionService>,
    events: EventBus,
    default_threshold: u32,
    exposure_multiplier: i64,
}

impl LoanService {
    pub fn new(
        store: Arc<MemoryStore>,
        numbers: Arc<NumberGenerator>,
        accounts: Arc<AccountService>,
        transactions: Arc<TransactionService>,
        events: EventBus,
        config: &Config,
    ) -> Self {
        Self {
            store,
            numbers,
            accounts,
            transactions,
            events,
            default_threshold: config.loan_default_threshold,
            exposure_multiplier: config.loan_exposure_multiplier,
        }
    }

    /// Submit a loan application.
    ///
    /// Underwriting checks, in order: the linked account exists and belongs
    /// to the borrower; the amount and term fit the product's ceilings;
    /// collateral is present where the product mandates it; and the exposure
    /// rule — outstanding loan balances plus the new principal must not
    /// exceed the configured multiple of the borrower's total deposits.
    ///
    /// The level monthly payment is fixed at origination from the product's
    /// rate; a zero-rate product falls back to straight-line repayment.
    pub async fn apply(
        &self,
        borrower: Uuid,
        linked_account: &str,
        loan_type: LoanType,
        amount_cents: i64,
        term_months: u32,
        collateral: Option<String>,
    ) -> Result<Loan> {
        let account = self.store.account(linked_account).await?;
        if account.owner != borrower {
            return Err(LedgerError::NotAccountOwner);
        }

        if amount_cents <= 0 || amount_cents > loan_type.max_amount_cents() {
            return Err(LedgerError::InvalidRequest(
                "loan amount outside the product's range".to_string(),
            ));
        }
        if term_months == 0 || term_months > loan_type.max_term_months() {
            return Err(LedgerError::InvalidRequest(
                "loan term outside the product's range".to_string(),
            ));
        }
        if loan_type.requires_collateral()
            && collateral.as_deref().is_none_or(|c| c.trim().is_empty())
        {
            return Err(LedgerError::CollateralRequired);
        }

        let outstanding: i64 = self
            .store
            .active_loans_by_borrower(borrower)
            .await
            .iter()
            .map(|l| l.remaining_balance_cents)
            .sum();
        let total_balance = self.accounts.total_balance(borrower).await;
        if outstanding + amount_cents > total_balance * self.exposure_multiplier {
            return Err(LedgerError::ExposureLimitExceeded);
        }

        let now = Utc::now();
        let loan = Loan {
            loan_id: self.numbers.loan_id(),
            borrower,
            linked_account: linked_account.to_string(),
            loan_type,
            principal_cents: amount_cents,
            interest_rate: loan_type.base_interest_rate(),
            remaining_balance_cents: amount_cents,
            monthly_payment_cents: monthly_payment_cents(
                amount_cents,
                loan_type.base_interest_rate(),
                term_months,
            ),
            total_paid_cents: 0,
            missed_payments: 0,
            term_months,
            months_remaining: term_months,
            status: LoanStatus::Pending,
            collateral,
            created_at: now,
            approved_at: None,
            next_payment_due: Some(now + Months::new(1)),
            last_payment_at: None,
        };

        self.store.create_loan(loan.clone()).await?;
        tracing::info!(loan = %loan.loan_id, %borrower, kind = ?loan_type, amount_cents, "loan application submitted");
        self.events.publish(Notification::LoanApplied { loan: loan.clone() });

        Ok(loan)
    }

    /// Pending → Approved.
    pub async fn approve(&self, loan_id: &str) -> Result<Loan> {
        self.store.loan(loan_id).await?;
        let _guard = self.store.loan_locks().lock(loan_id).await;
        let loan = self.store.loan(loan_id).await?;
        if loan.status != LoanStatus::Pending {
            return Err(LedgerError::InvalidLoanState(
                "only pending loans can be approved".to_string(),
            ));
        }

        let updated = self
            .store
            .update_loan(loan_id, |l| {
                l.status = LoanStatus::Approved;
                l.approved_at = Some(Utc::now());
            })
            .await?;
        self.events.publish(Notification::LoanApproved {
            loan_id: loan_id.to_string(),
        });
        Ok(updated)
    }

    /// Pending → Rejected.
    pub async fn reject(&self, loan_id: &str, reason: &str) -> Result<Loan> {
        self.store.loan(loan_id).await?;
        let _guard = self.store.loan_locks().lock(loan_id).await;
        let loan = self.store.loan(loan_id).await?;
        if loan.status != LoanStatus::Pending {
            return Err(LedgerError::InvalidLoanState(
                "only pending loans can be rejected".to_string(),
            ));
        }

        let updated = self
            .store
            .update_loan(loan_id, |l| l.status = LoanStatus::Rejected)
            .await?;
        tracing::info!(loan = loan_id, reason, "loan rejected");
        self.events.publish(Notification::LoanRejected {
            loan_id: loan_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(updated)
    }

    /// Pending → Cancelled: the applicant withdraws before disbursement.
    pub async fn cancel(&self, loan_id: &str) -> Result<Loan> {
        self.store.loan(loan_id).await?;
        let _guard = self.store.loan_locks().lock(loan_id).await;
        let loan = self.store.loan(loan_id).await?;
        if loan.status != LoanStatus::Pending {
            return Err(LedgerError::InvalidLoanState(
                "only pending loans can be cancelled".to_string(),
            ));
        }

        let updated = self
            .store
            .update_loan(loan_id, |l| l.status = LoanStatus::Cancelled)
            .await?;
        self.events.publish(Notification::LoanCancelled {
            loan_id: loan_id.to_string(),
        });
        Ok(updated)
    }

    /// Approved → Active: credit the principal to the linked account and
    /// record the disbursement.
    pub async fn disburse(&self, loan_id: &str) -> Result<Loan> {
        self.store.loan(loan_id).await?;

        // Loan lock first, account lock second (inside `credit`); every
        // loan-and-account path uses that order.
        let _guard = self.store.loan_locks().lock(loan_id).await;
        let loan = self.store.loan(loan_id).await?;
        if loan.status != LoanStatus::Approved {
            return Err(LedgerError::InvalidLoanState(
                "only approved loans can be disbursed".to_string(),
            ));
        }

        self.accounts
            .credit(&loan.linked_account, loan.principal_cents)
            .await?;
        let updated = self
            .store
            .update_loan(loan_id, |l| l.status = LoanStatus::Active)
            .await?;
        self.transactions
            .record_loan_disbursement(
                &loan.linked_account,
                loan.principal_cents,
                loan_id,
                loan.borrower,
            )
            .await?;

        tracing::info!(loan = loan_id, amount_cents = loan.principal_cents, "loan disbursed");
        self.events.publish(Notification::LoanDisbursed {
            loan_id: loan_id.to_string(),
            amount_cents: loan.principal_cents,
        });

        Ok(updated)
    }

    /// Make a payment on an active loan; `amount_cents` defaults to the
    /// scheduled monthly payment.
    ///
    /// The debit skips the account's daily withdrawal ceiling but still
    /// requires the plain balance to cover the amount. The remaining balance clamps
    /// at zero; reaching zero transitions the loan to PaidOff.
    pub async fn make_payment(&self, loan_id: &str, amount_cents: Option<i64>) -> Result<Loan> {
        self.store.loan(loan_id).await?;

        // Serialize per loan so two concurrent payments cannot both observe
        // Active and charge the borrower against a loan the other closed.
        let _guard = self.store.loan_locks().lock(loan_id).await;
        let loan = self.store.loan(loan_id).await?;
        if loan.status != LoanStatus::Active {
            return Err(LedgerError::InvalidLoanState(
                "loan is not active".to_string(),
            ));
        }

        let payment = amount_cents.unwrap_or(loan.monthly_payment_cents);
        if payment <= 0 {
            return Err(LedgerError::InvalidRequest(
                "payment amount must be positive".to_string(),
            ));
        }

        self.accounts.force_debit(&loan.linked_account, payment).await?;

        let now = Utc::now();
        let updated = self
            .store
            .update_loan(loan_id, |l| {
                l.remaining_balance_cents = (l.remaining_balance_cents - payment).max(0);
                l.months_remaining = l.months_remaining.saturating_sub(1);
                l.total_paid_cents += payment;
                l.last_payment_at = Some(now);
                if l.remaining_balance_cents == 0 {
                    l.status = LoanStatus::PaidOff;
                    l.next_payment_due = None;
                } else {
                    l.next_payment_due = Some(now + Months::new(1));
                }
            })
            .await?;

        self.transactions
            .record_loan_payment(&loan.linked_account, payment, loan_id, loan.borrower)
            .await?;

        if updated.status == LoanStatus::PaidOff {
            tracing::info!(loan = loan_id, "loan paid off");
            self.events.publish(Notification::LoanPaidOff {
                loan_id: loan_id.to_string(),
            });
        } else {
            self.events.publish(Notification::LoanPaymentMade {
                loan_id: loan_id.to_string(),
                amount_cents: payment,
            });
        }

        Ok(updated)
    }

    /// Scheduler entry point: charge every active loan whose due date has
    /// passed with one missed payment, pushing the due date a month out so a
    /// single missed month is counted once. Crossing the threshold
    /// transitions the loan to Defaulted.
    ///
    /// Returns the number of loans that defaulted in this sweep.
    pub async fn process_overdue_loans(&self, now: DateTime<Utc>) -> Result<usize> {
        let overdue = self.store.overdue_loans(now).await;
        let mut defaulted = 0;

        for loan in overdue {
            let _guard = self.store.loan_locks().lock(&loan.loan_id).await;
            // Re-read under the lock; a payment may have landed since the
            // listing and pushed the due date out.
            let current = match self.store.loan(&loan.loan_id).await {
                Ok(l) => l,
                Err(_) => continue,
            };
            if !current.is_overdue(now) {
                continue;
            }

            let threshold = self.default_threshold;
            let updated = self
                .store
                .update_loan(&loan.loan_id, |l| {
                    l.missed_payments += 1;
                    l.next_payment_due = l.next_payment_due.map(|due| due + Months::new(1));
                    if l.missed_payments >= threshold {
                        l.status = LoanStatus::Defaulted;
                        l.next_payment_due = None;
                    }
                })
                .await?;

            tracing::warn!(
                loan = %loan.loan_id,
                missed = updated.missed_payments,
                "missed loan payment"
            );
            if updated.status == LoanStatus::Defaulted {
                defaulted += 1;
                tracing::warn!(loan = %loan.loan_id, "loan defaulted");
                self.events.publish(Notification::LoanDefaulted {
                    loan_id: loan.loan_id.clone(),
                });
            }
        }

        Ok(defaulted)
    }

    // --- reads ---

    pub async fn loan(&self, loan_id: &str) -> Result<Loan> {
        self.store.loan(loan_id).await
    }

    pub async fn loans_by_borrower(&self, borrower: Uuid) -> Vec<Loan> {
        self.store.loans_by_borrower(borrower).await
    }

    pub async fn active_loans(&self, borrower: Uuid) -> Vec<Loan> {
        self.store.active_loans_by_borrower(borrower).await
    }

    pub async fn pending_loans(&self) -> Vec<Loan> {
        self.store.loans_by_status(LoanStatus::Pending).await
    }

    pub async fn overdue_loans(&self, now: DateTime<Utc>) -> Vec<Loan> {
        self.store.overdue_loans(now).await
    }
}
