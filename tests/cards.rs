mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use common::{funded_account, services};
use ledger_core::LedgerError;
use ledger_core::models::account::AccountType;
use ledger_core::models::card::{CardType, CardUseResult};

#[tokio::test]
async fn authorized_spend_debits_the_linked_account() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 50_000).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();

    let result = svc
        .cards
        .authorize(&card.card_number, "1234", 7_500, "Grocery store")
        .await
        .unwrap();
    assert_eq!(result, CardUseResult::Success);
    assert_eq!(svc.accounts.balance(&checking.account_number).await.unwrap(), 42_500);

    let refreshed = svc.cards.card(&card.card_number).await.unwrap();
    assert_eq!(refreshed.spent_today_cents, 7_500);
    assert!(refreshed.last_used.is_some());
}

#[tokio::test]
async fn card_daily_limit_is_enforced_per_card() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 100_000).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();
    // Tighten the card's limit so the ceiling trips before the balance does
    svc.store
        .update_card(&card.card_number, |c| c.daily_limit_cents = 5_000)
        .await
        .unwrap();

    let first = svc
        .cards
        .authorize(&card.card_number, "1234", 4_900, "a")
        .await
        .unwrap();
    assert_eq!(first, CardUseResult::Success);

    let over = svc
        .cards
        .authorize(&card.card_number, "1234", 150, "b")
        .await
        .unwrap();
    assert_eq!(over, CardUseResult::DailyLimitExceeded);

    let exact = svc
        .cards
        .authorize(&card.card_number, "1234", 100, "c")
        .await
        .unwrap();
    assert_eq!(exact, CardUseResult::Success);
}

#[tokio::test]
async fn wrong_pin_is_rejected_without_touching_the_account() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 10_000).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();

    let result = svc
        .cards
        .authorize(&card.card_number, "9999", 1_000, "x")
        .await
        .unwrap();
    assert_eq!(result, CardUseResult::InvalidPin);
    assert_eq!(svc.accounts.balance(&checking.account_number).await.unwrap(), 10_000);
}

#[tokio::test]
async fn business_cards_require_business_accounts() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 0).await;

    let result = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::BusinessDebit, "1234")
        .await;
    assert!(matches!(result, Err(LedgerError::IncompatibleCardType)));
}

#[tokio::test]
async fn cancelled_cards_stay_dead() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 10_000).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();

    svc.cards.cancel_card(&card.card_number).await.unwrap();
    let result = svc
        .cards
        .authorize(&card.card_number, "1234", 100, "x")
        .await
        .unwrap();
    assert_eq!(result, CardUseResult::CardInactive);

    // Unfreezing is not reactivation
    svc.cards.unfreeze_card(&card.card_number).await.unwrap();
    let result = svc
        .cards
        .authorize(&card.card_number, "1234", 100, "x")
        .await
        .unwrap();
    assert_eq!(result, CardUseResult::CardInactive);
}

#[tokio::test]
async fn frozen_cards_thaw() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 10_000).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();

    svc.cards.freeze_card(&card.card_number).await.unwrap();
    let frozen = svc
        .cards
        .authorize(&card.card_number, "1234", 100, "x")
        .await
        .unwrap();
    assert_eq!(frozen, CardUseResult::CardFrozen);

    svc.cards.unfreeze_card(&card.card_number).await.unwrap();
    let thawed = svc
        .cards
        .authorize(&card.card_number, "1234", 100, "x")
        .await
        .unwrap();
    assert_eq!(thawed, CardUseResult::Success);
}

#[tokio::test]
async fn expired_cards_decline() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 10_000).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();

    let yesterday = (Utc::now() - Duration::days(1)).date_naive();
    svc.store
        .update_card(&card.card_number, |c| c.expiration_date = yesterday)
        .await
        .unwrap();

    let result = svc
        .cards
        .authorize(&card.card_number, "1234", 100, "x")
        .await
        .unwrap();
    assert_eq!(result, CardUseResult::CardExpired);
}

#[tokio::test]
async fn declined_account_side_reads_as_insufficient_funds() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 500).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();

    let result = svc
        .cards
        .authorize(&card.card_number, "1234", 10_000, "x")
        .await
        .unwrap();
    assert_eq!(result, CardUseResult::InsufficientFunds);

    // Frozen accounts decline the same way; the terminal sees no difference
    svc.accounts.freeze_account(&checking.account_number).await.unwrap();
    let result = svc
        .cards
        .authorize(&card.card_number, "1234", 100, "x")
        .await
        .unwrap();
    assert_eq!(result, CardUseResult::InsufficientFunds);
}

#[tokio::test]
async fn change_pin_verifies_the_old_one() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 10_000).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();

    let wrong = svc.cards.change_pin(&card.card_number, "0000", "5678").await;
    assert!(matches!(wrong, Err(LedgerError::InvalidPin)));

    svc.cards.change_pin(&card.card_number, "1234", "5678").await.unwrap();

    let old = svc
        .cards
        .authorize(&card.card_number, "1234", 100, "x")
        .await
        .unwrap();
    assert_eq!(old, CardUseResult::InvalidPin);

    let new = svc
        .cards
        .authorize(&card.card_number, "5678", 100, "x")
        .await
        .unwrap();
    assert_eq!(new, CardUseResult::Success);
}

#[tokio::test]
async fn concurrent_authorizations_share_the_card_daily_limit() {
    let svc = Arc::new(services());
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 100_000).await;
    let card = svc
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "1234")
        .await
        .unwrap();
    svc.store
        .update_card(&card.card_number, |c| c.daily_limit_cents = 5_000)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let svc = svc.clone();
        let number = card.card_number.clone();
        handles.push(tokio::spawn(async move {
            svc.cards.authorize(&number, "1234", 3_000, "Coffee cart").await.unwrap()
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    outcomes.sort_by_key(|o| *o != CardUseResult::Success);

    // A 5_000-cent limit covers exactly one 3_000-cent spend
    assert_eq!(outcomes, [CardUseResult::Success, CardUseResult::DailyLimitExceeded]);

    let refreshed = svc.cards.card(&card.card_number).await.unwrap();
    assert_eq!(refreshed.spent_today_cents, 3_000);
    assert_eq!(svc.accounts.balance(&checking.account_number).await.unwrap(), 97_000);
}
