//! Card authorization service.
//!
//! Issues cards against owner-matching, type-compatible accounts and
//! authorizes point-of-sale spends against the linked account. The actual
//! debit is delegated to the account ledger service; only card-side state
//! (spend tally, last-used) is managed here.

use std::sync::Arc;

use chrono::{Months, Utc};
use uuid::Uuid;

use crate::error::{LedgerError, Result};
use crate::events::{EventBus, Notification};
use crate::models::account::WithdrawalResult;
use crate::models::card::{Card, CardType, CardUseResult};
use crate::services::accounts::AccountService;
use crate::services::numbers::NumberGenerator;
use crate::services::transactions::TransactionService;
use crate::store::MemoryStore;

pub struct CardService {
    store: Arc<MemoryStore>,
    numbers: Arc<NumberGenerator>,
    accounts: Arc<AccountService>,
    transactions: Arc<TransactionService>,
    events: EventBus,
    validity_months: u32,
}

impl CardService {
    pub fn new(
        store: Arc<MemoryStore>,
        numbers: Arc<NumberGenerator>,
        accounts: Arc<AccountService>,
        transactions: Arc<TransactionService>,
        events: EventBus,
        validity_months: u32,
    ) -> Self {
        Self {
            store,
            numbers,
            accounts,
            transactions,
            events,
            validity_months,
        }
    }

    /// Issue a card against an existing account.
    ///
    /// The account must exist, belong to `owner`, and have a type compatible
    /// with the requested card tier. The card receives the tier's default
    /// daily limit and a fresh salted PIN hash.
    pub async fn issue_card(
        &self,
        owner: Uuid,
        linked_account: &str,
        card_type: CardType,
        pin: &str,
    ) -> Result<Card> {
        let account = self.store.account(linked_account).await?;
        if account.owner != owner {
            return Err(LedgerError::NotAccountOwner);
        }
        if !card_type.is_compatible_with(account.account_type) {
            return Err(LedgerError::IncompatibleCardType);
        }

        let now = Utc::now();
        let card = Card {
            card_number: self.numbers.card_number(),
            cvv: self.numbers.cvv(),
            linked_account: linked_account.to_string(),
            owner,
            card_type,
            expiration_date: now.date_naive() + Months::new(self.validity_months),
            pin_hash: self.numbers.hash_pin(pin),
            daily_limit_cents: card_type.default_daily_limit_cents(),
            spent_today_cents: 0,
            last_used: None,
            active: true,
            frozen: false,
            created_at: now,
        };

        self.store.create_card(card.clone()).await?;
        tracing::info!(card = %card.masked_number(), %owner, kind = ?card_type, "card issued");
        self.events.publish(Notification::CardIssued {
            card_number: card.card_number.clone(),
            owner,
        });

        Ok(card)
    }

    /// Authorize a point-of-sale spend.
    ///
    /// Check order: card lookup, PIN, card state (inactive/frozen/expired),
    /// card daily limit, then the account-side debit. Any account-side
    /// rejection — frozen, account daily ceiling, balance — surfaces as
    /// [`CardUseResult::InsufficientFunds`], matching what a merchant
    /// terminal is told.
    pub async fn authorize(
        &self,
        card_number: &str,
        pin: &str,
        amount_cents: i64,
        merchant_description: &str,
    ) -> Result<CardUseResult> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidRequest(
                "authorization amount must be positive".to_string(),
            ));
        }

        self.store.card(card_number).await?;

        // Serialize per card so the limit check and the tally write below
        // cannot interleave with a concurrent authorization. The card lock
        // is always taken before the account lock inside `apply_debit`.
        let _guard = self.store.card_locks().lock(card_number).await;
        let card = self.store.card(card_number).await?;

        if !self.numbers.verify_pin(pin, &card.pin_hash) {
            return Ok(CardUseResult::InvalidPin);
        }

        let now = Utc::now();
        let today = now.date_naive();
        let card_check = card.check_spend(amount_cents, today);
        if card_check != CardUseResult::Success {
            return Ok(card_check);
        }

        // Card spends do not advance the account's withdrawal tally; the
        // card carries its own daily ceiling.
        match self
            .accounts
            .apply_debit(&card.linked_account, amount_cents, false)
            .await
        {
            Ok(WithdrawalResult::Success) => {}
            Ok(_) | Err(LedgerError::AccountNotFound) => {
                return Ok(CardUseResult::InsufficientFunds);
            }
            Err(e) => return Err(e),
        }

        self.store
            .update_card(card_number, |c| {
                c.spent_today_cents = c.spent_on(today) + amount_cents;
                c.last_used = Some(now);
            })
            .await?;

        self.transactions
            .record_card_purchase(
                &card.linked_account,
                amount_cents,
                card.owner,
                merchant_description,
            )
            .await?;
        self.events.publish(Notification::CardUsed {
            card_number: card_number.to_string(),
            amount_cents,
        });

        Ok(CardUseResult::Success)
    }

    pub async fn freeze_card(&self, card_number: &str) -> Result<()> {
        self.store
            .update_card(card_number, |c| c.frozen = true)
            .await?;
        self.events.publish(Notification::CardFrozen {
            card_number: card_number.to_string(),
        });
        Ok(())
    }

    pub async fn unfreeze_card(&self, card_number: &str) -> Result<()> {
        self.store
            .update_card(card_number, |c| c.frozen = false)
            .await?;
        self.events.publish(Notification::CardUnfrozen {
            card_number: card_number.to_string(),
        });
        Ok(())
    }

    /// Permanently deactivate a card. There is no reactivation path;
    /// cancelled cards fail every authorization with `CardInactive`.
    pub async fn cancel_card(&self, card_number: &str) -> Result<()> {
        self.store
            .update_card(card_number, |c| c.active = false)
            .await?;
        tracing::info!(card = card_number, "card cancelled");
        self.events.publish(Notification::CardCancelled {
            card_number: card_number.to_string(),
        });
        Ok(())
    }

    /// Replace the PIN after verifying the current one.
    pub async fn change_pin(&self, card_number: &str, old_pin: &str, new_pin: &str) -> Result<()> {
        self.store.card(card_number).await?;
        let _guard = self.store.card_locks().lock(card_number).await;
        let card = self.store.card(card_number).await?;
        if !self.numbers.verify_pin(old_pin, &card.pin_hash) {
            return Err(LedgerError::InvalidPin);
        }
        let new_hash = self.numbers.hash_pin(new_pin);
        self.store
            .update_card(card_number, |c| c.pin_hash = new_hash)
            .await?;
        Ok(())
    }

    // --- reads ---

    pub async fn card(&self, card_number: &str) -> Result<Card> {
        self.store.card(card_number).await
    }

    pub async fn cards_by_owner(&self, owner: Uuid) -> Vec<Card> {
        self.store.cards_by_owner(owner).await
    }

    pub async fn cards_by_account(&self, account_number: &str) -> Vec<Card> {
        self.store.cards_by_account(account_number).await
    }
}
