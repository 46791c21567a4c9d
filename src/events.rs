//! Fire-and-forget domain notifications.
//!
//! Services publish a [`Notification`] after every externally interesting
//! state change. Delivery rides a `tokio::sync::broadcast` channel: sends are
//! best-effort, never block, and never affect the outcome of the operation
//! that triggered them. Subscribers that fall behind lose the oldest events,
//! which is acceptable for an observer-only surface (GUIs, command adapters,
//! economy bridges).

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::account::Account;
use crate::models::loan::Loan;
use crate::models::transaction::Transaction;

/// A domain event emitted by the ledger core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    AccountCreated { account: Account },
    CardIssued { card_number: String, owner: Uuid },
    CardUsed { card_number: String, amount_cents: i64 },
    CardFrozen { card_number: String },
    CardUnfrozen { card_number: String },
    CardCancelled { card_number: String },
    LoanApplied { loan: Loan },
    LoanApproved { loan_id: String },
    LoanRejected { loan_id: String, reason: String },
    LoanCancelled { loan_id: String },
    LoanDisbursed { loan_id: String, amount_cents: i64 },
    LoanPaymentMade { loan_id: String, amount_cents: i64 },
    LoanPaidOff { loan_id: String },
    LoanDefaulted { loan_id: String },
    TransactionRecorded { transaction: Transaction },
}

/// Cloneable handle for publishing and subscribing to [`Notification`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Publish an event. A send error just means nobody is listening.
    pub fn publish(&self, notification: Notification) {
        let _ = self.tx.send(notification);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        bus.publish(Notification::CardFrozen {
            card_number: "4000000000000002".to_string(),
        });
    }

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(Notification::LoanApproved {
            loan_id: "LN1".to_string(),
        });
        bus.publish(Notification::LoanDisbursed {
            loan_id: "LN1".to_string(),
            amount_cents: 100,
        });
        assert!(matches!(
            rx.recv().await.unwrap(),
            Notification::LoanApproved { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            Notification::LoanDisbursed { .. }
        ));
    }
}
