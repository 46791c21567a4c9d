//! Loans: products, state machine, and the amortization math.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Loan product. Carries the base rate, the ceilings, and whether collateral
/// is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    Personal,
    Business,
    Mortgage,
    Emergency,
    Student,
}

impl LoanType {
    pub fn display_name(&self) -> &'static str {
        match self {
            LoanType::Personal => "Personal Loan",
            LoanType::Business => "Business Loan",
            LoanType::Mortgage => "Mortgage",
            LoanType::Emergency => "Emergency Loan",
            LoanType::Student => "Student Loan",
        }
    }

    /// Annual base rate in percent, copied onto the loan at origination.
    pub fn base_interest_rate(&self) -> f64 {
        match self {
            LoanType::Personal => 8.0,
            LoanType::Business => 6.5,
            LoanType::Mortgage => 4.5,
            LoanType::Emergency => 12.0,
            LoanType::Student => 3.5,
        }
    }

    pub fn max_term_months(&self) -> u32 {
        match self {
            LoanType::Personal => 60,
            LoanType::Business => 120,
            LoanType::Mortgage => 360,
            LoanType::Emergency => 12,
            LoanType::Student => 120,
        }
    }

    pub fn max_amount_cents(&self) -> i64 {
        match self {
            LoanType::Personal => 5_000_000,
            LoanType::Business => 50_000_000,
            LoanType::Mortgage => 100_000_000,
            LoanType::Emergency => 1_000_000,
            LoanType::Student => 10_000_000,
        }
    }

    pub fn requires_collateral(&self) -> bool {
        matches!(self, LoanType::Business | LoanType::Mortgage)
    }
}

/// Loan lifecycle. Transitions are driven exclusively by the loan service:
///
/// ```text
/// Pending --approve--> Approved --disburse--> Active --paid in full--> PaidOff
/// Pending --reject--> Rejected          Active --3 missed--> Defaulted
/// Pending --cancel--> Cancelled
/// ```
///
/// PaidOff, Defaulted, Rejected, and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Application submitted, awaiting underwriting.
    Pending,
    /// Approved, awaiting disbursement.
    Approved,
    /// Funds disbursed; repayments in progress.
    Active,
    /// Fully repaid.
    PaidOff,
    /// Borrower missed too many payments.
    Defaulted,
    /// Application rejected.
    Rejected,
    /// Withdrawn before disbursement.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    /// Unique loan reference, e.g. `LN1ABC2DEF3GH`.
    pub loan_id: String,
    pub borrower: Uuid,
    /// Account the principal is disbursed to and payments are taken from.
    pub linked_account: String,
    pub loan_type: LoanType,
    pub principal_cents: i64,
    /// Annual rate in percent, fixed at origination.
    pub interest_rate: f64,
    /// Monotonically non-increasing while the loan is active; clamped at
    /// zero.
    pub remaining_balance_cents: i64,
    /// Level payment computed by [`monthly_payment_cents`].
    pub monthly_payment_cents: i64,
    pub total_paid_cents: i64,
    pub missed_payments: u32,
    pub term_months: u32,
    pub months_remaining: u32,
    pub status: LoanStatus,
    /// Description of the pledged collateral for secured products.
    pub collateral: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub next_payment_due: Option<DateTime<Utc>>,
    pub last_payment_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, LoanStatus::Active)
            && self.next_payment_due.is_some_and(|due| due < now)
    }

    /// Total interest cost over the full term, assuming level payments.
    pub fn total_interest_cents(&self) -> i64 {
        self.monthly_payment_cents * self.term_months as i64 - self.principal_cents
    }
}

/// Level monthly payment for a loan via the standard amortization formula
/// `P * r * (1+r)^n / ((1+r)^n - 1)`, with `r` the monthly rate.
///
/// Falls back to straight-line `P / n` when the rate is zero. The result is
/// rounded to whole cents; the final scheduled payment absorbs the rounding
/// drift.
pub fn monthly_payment_cents(principal_cents: i64, annual_rate_pct: f64, term_months: u32) -> i64 {
    if term_months == 0 {
        return 0;
    }
    let principal = principal_cents as f64;
    let monthly_rate = annual_rate_pct / 100.0 / 12.0;

    let payment = if monthly_rate > 0.0 {
        let growth = (1.0 + monthly_rate).powi(term_months as i32);
        principal * (monthly_rate * growth) / (growth - 1.0)
    } else {
        principal / term_months as f64
    };

    payment.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amortization_satisfies_the_closed_form() {
        // 1200.00 at 12%/year over 12 months
        let principal = 120_000_i64;
        let rate = 12.0;
        let n = 12_u32;
        let m = monthly_payment_cents(principal, rate, n) as f64;

        let r = rate / 100.0 / 12.0;
        let growth = (1.0 + r).powi(n as i32);
        // M * ((1+r)^n - 1) == P * r * (1+r)^n, within rounding tolerance
        let lhs = m * (growth - 1.0);
        let rhs = principal as f64 * r * growth;
        assert!((lhs - rhs).abs() < growth, "lhs={lhs} rhs={rhs}");
    }

    #[test]
    fn known_payment_amount() {
        // Textbook figure: $1200 at 12% over 12 months is $106.62/month
        assert_eq!(monthly_payment_cents(120_000, 12.0, 12), 10_662);
    }

    #[test]
    fn zero_rate_falls_back_to_straight_line() {
        assert_eq!(monthly_payment_cents(120_000, 0.0, 12), 10_000);
    }

    #[test]
    fn zero_term_pays_nothing() {
        assert_eq!(monthly_payment_cents(120_000, 5.0, 0), 0);
    }

    #[test]
    fn payments_cover_the_principal() {
        for (principal, rate, n) in [
            (50_000_i64, 8.0, 24_u32),
            (1_000_000, 4.5, 360),
            (777_777, 12.0, 12),
        ] {
            let m = monthly_payment_cents(principal, rate, n);
            assert!(m * n as i64 >= principal, "{principal} {rate} {n}");
        }
    }
}
