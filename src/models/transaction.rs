//! Immutable transaction log entries.
//!
//! One record is appended for every balance mutation. Records are never
//! mutated after creation; the only permitted change is a status transition
//! from pending to completed or failed, and the services in this crate write
//! records as completed in the first place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Initiator recorded on system-generated entries (interest, fees).
pub const SYSTEM_INITIATOR: Uuid = Uuid::nil();

/// The balance mutation category a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    CardPurchase,
    LoanDisbursement,
    LoanPayment,
    InterestCredit,
    FeeDeduction,
    AtmWithdrawal,
    AtmDeposit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// A single append-only ledger entry.
///
/// Exactly one of `from_account` / `to_account` is `None` for pure deposits
/// and withdrawals; both are set for transfers. Transfers are recorded as one
/// entry referencing both account numbers, not as offsetting postings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction reference, e.g. `TXN1ABC2DEF3GHIJKLMN`.
    pub transaction_id: String,
    /// Source account number; `None` for deposits and credits.
    pub from_account: Option<String>,
    /// Destination account number; `None` for withdrawals and debits.
    pub to_account: Option<String>,
    /// Amount moved, in cents. Always positive.
    pub amount_cents: i64,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    /// Free-text description shown in statements.
    pub description: String,
    /// Fee charged on top of `amount_cents`, in cents. Zero for most
    /// categories; nonzero for ATM withdrawals.
    pub fee_cents: i64,
    /// Identity that initiated the mutation; [`SYSTEM_INITIATOR`] for
    /// scheduler-driven entries.
    pub initiated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
