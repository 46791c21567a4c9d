//! Crate-wide error type.
//!
//! Not-found conditions and rule violations that abort an operation outright
//! are surfaced through [`LedgerError`]. Operations with several expected
//! business outcomes (withdrawals, transfers, card authorizations, ATM use)
//! return dedicated result enums instead, so callers can match on exactly the
//! outcomes that operation can produce.

/// Errors produced by the ledger core.
///
/// Every variant is an expected, recoverable condition; nothing here panics.
/// Not-found variants are terminal for the triggering request and should not
/// be retried. The remaining variants are policy violations the caller can
/// report back to whoever initiated the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// No account exists under the given account number.
    #[error("account not found")]
    AccountNotFound,

    /// No card exists under the given card number.
    #[error("card not found")]
    CardNotFound,

    /// No loan exists under the given loan id.
    #[error("loan not found")]
    LoanNotFound,

    /// No ATM exists under the given device id.
    #[error("ATM not found")]
    AtmNotFound,

    /// No bank is registered under the given bank id.
    #[error("bank not found")]
    BankNotFound,

    /// The owner already holds an account of this type. Only wallets may be
    /// held in multiples.
    #[error("an account of this type already exists for this owner")]
    DuplicateAccount,

    /// A record with the same unique key already exists in the store.
    #[error("a record with this key already exists")]
    DuplicateRecord,

    /// The account is frozen and cannot be mutated.
    #[error("account is frozen")]
    AccountFrozen,

    /// The account exists but belongs to someone other than the requester.
    #[error("account does not belong to the requester")]
    NotAccountOwner,

    /// The requested card type cannot be issued against the linked account's
    /// type.
    #[error("card type is not compatible with the linked account")]
    IncompatibleCardType,

    /// The loan type mandates collateral and none was offered.
    #[error("collateral is required for this loan type")]
    CollateralRequired,

    /// Originating this loan would push the borrower's outstanding balance
    /// past the configured exposure multiple of their deposits.
    #[error("total loan exposure would exceed the credit limit")]
    ExposureLimitExceeded,

    /// The account balance does not cover the requested debit.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// The supplied PIN does not match the stored hash.
    #[error("invalid PIN")]
    InvalidPin,

    /// The loan is not in the state the requested transition starts from.
    #[error("invalid loan state: {0}")]
    InvalidLoanState(String),

    /// Malformed input: non-positive amounts, zero terms, and similar.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LedgerError>;
