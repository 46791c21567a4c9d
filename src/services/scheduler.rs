//! Periodic ledger maintenance.
//!
//! One scheduler owns three jobs: daily withdrawal-tally resets, monthly
//! interest and maintenance fees, and the overdue-loan sweep. Jobs are
//! driven by wall-clock dates rather than tick counts, so a missed tick
//! (restart, long pause) catches up on the next one instead of skipping
//! a period.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::services::accounts::AccountService;
use crate::services::loans::LoanService;
use crate::services::transactions::TransactionService;
use crate::store::MemoryStore;

struct SchedulerState {
    last_daily: Option<NaiveDate>,
    last_monthly: Option<(i32, u32)>,
}

pub struct Scheduler {
    store: Arc<MemoryStore>,
    accounts: Arc<AccountService>,
    transactions: Arc<TransactionService>,
    loans: Arc<LoanService>,
    tick: Duration,
    state: Mutex<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        store: Arc<MemoryStore>,
        accounts: Arc<AccountService>,
        transactions: Arc<TransactionService>,
        loans: Arc<LoanService>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            accounts,
            transactions,
            loans,
            tick: Duration::from_secs(config.scheduler_tick_secs),
            state: Mutex::new(SchedulerState {
                last_daily: None,
                last_monthly: None,
            }),
        }
    }

    /// Run whichever jobs are due at `now`. Idempotent within a period:
    /// calling twice on the same day or in the same month runs each job once.
    pub async fn run_pending(&self, now: DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        let month = (today.year(), today.month());

        // Hold the state lock across the jobs and mark a period consumed
        // only after its jobs completed, so a failed sweep is retried on
        // the next tick instead of silently skipping the period.
        let mut state = self.state.lock().await;

        if state.last_daily != Some(today) {
            self.reset_daily_tallies().await?;
            let defaulted = self.loans.process_overdue_loans(now).await?;
            if defaulted > 0 {
                tracing::info!(defaulted, "overdue loan sweep marked defaults");
            }
            state.last_daily = Some(today);
        }
        if state.last_monthly != Some(month) {
            self.apply_monthly_interest().await?;
            self.apply_monthly_fees().await?;
            state.last_monthly = Some(month);
        }
        Ok(())
    }

    /// Zero the per-day withdrawal and card-spend tallies. Reads also
    /// roll over lazily by date; this keeps stored snapshots tidy.
    pub async fn reset_daily_tallies(&self) -> Result<()> {
        let today = Utc::now().date_naive();
        for number in self.store.all_account_numbers().await {
            // Account may have been closed since the listing; skip before
            // locking so the registry does not regrow an entry for it.
            if self.store.account(&number).await.is_err() {
                continue;
            }
            let _guard = self.store.locks().lock(&number).await;
            if self.store.account(&number).await.is_err() {
                continue;
            }
            self.store
                .update_account(&number, |a| {
                    a.daily_withdrawn_cents = 0;
                    a.last_withdrawal_date = today;
                })
                .await?;
        }
        Ok(())
    }

    /// Credit one month of interest to every account whose type earns it.
    /// Annual rates are divided by twelve; credits below one cent are
    /// skipped rather than rounded up.
    pub async fn apply_monthly_interest(&self) -> Result<()> {
        for number in self.store.all_account_numbers().await {
            let Ok(account) = self.store.account(&number).await else {
                continue;
            };
            let rate = account.account_type.interest_rate();
            if rate <= 0.0 || account.balance_cents <= 0 {
                continue;
            }
            let interest = (account.balance_cents as f64 * rate / 100.0 / 12.0).round() as i64;
            if interest < 1 {
                continue;
            }
            match self.accounts.credit(&number, interest).await {
                Ok(_) => {
                    self.transactions
                        .record_interest_credit(&number, interest)
                        .await?;
                    tracing::debug!(account = %number, cents = interest, "interest credited");
                }
                Err(err) => {
                    // Account closed between the listing and the credit;
                    // skip it and keep sweeping.
                    tracing::warn!(account = %number, %err, "interest credit skipped");
                }
            }
        }
        Ok(())
    }

    /// Deduct monthly maintenance fees. A fee never overdraws: accounts
    /// holding less than the fee pay what they have, down to zero.
    pub async fn apply_monthly_fees(&self) -> Result<()> {
        for number in self.store.all_account_numbers().await {
            let Ok(account) = self.store.account(&number).await else {
                continue;
            };
            let fee = account.account_type.monthly_fee_cents();
            if fee <= 0 || account.balance_cents <= 0 {
                continue;
            }
            let charged = fee.min(account.balance_cents);
            let description = if charged < fee {
                "Monthly maintenance fee (partial)"
            } else {
                "Monthly maintenance fee"
            };
            match self.accounts.force_debit(&number, charged).await {
                Ok(_) => {
                    self.transactions
                        .record_fee_deduction(&number, charged, description)
                        .await?;
                }
                Err(err) => {
                    // Balance moved between the read and the debit; skip
                    // this cycle rather than retry.
                    tracing::warn!(account = %number, %err, "fee deduction skipped");
                }
            }
        }
        Ok(())
    }

    /// Drive the scheduler from a background task until the process exits.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(err) = self.run_pending(Utc::now()).await {
                    tracing::error!(%err, "scheduled maintenance failed");
                }
            }
        })
    }
}
