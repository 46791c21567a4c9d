mod common;

use std::sync::Arc;

use uuid::Uuid;

use common::{funded_account, services};
use ledger_core::LedgerError;
use ledger_core::models::account::{AccountType, WithdrawalResult};
use ledger_core::models::transaction::TransactionType;
use ledger_core::services::accounts::TransferResult;

#[tokio::test]
async fn transfer_moves_money_and_logs_one_transaction() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 10_000).await;
    let savings = svc
        .accounts
        .open_account(alice, AccountType::Savings, 0, "")
        .await
        .unwrap();

    let result = svc
        .accounts
        .transfer(&checking.account_number, &savings.account_number, 4_000, alice, "")
        .await
        .unwrap();
    assert_eq!(result, TransferResult::Success);

    assert_eq!(svc.accounts.balance(&checking.account_number).await.unwrap(), 6_000);
    assert_eq!(svc.accounts.balance(&savings.account_number).await.unwrap(), 4_000);

    let transfers: Vec<_> = svc
        .transactions
        .history(&checking.account_number, 50)
        .await
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::Transfer)
        .collect();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].from_account.as_deref(), Some(checking.account_number.as_str()));
    assert_eq!(transfers[0].to_account.as_deref(), Some(savings.account_number.as_str()));
}

#[tokio::test]
async fn transfer_rejects_bad_requests_without_moving_money() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 10_000).await;
    let savings = svc
        .accounts
        .open_account(alice, AccountType::Savings, 0, "")
        .await
        .unwrap();

    let same = svc
        .accounts
        .transfer(&checking.account_number, &checking.account_number, 100, alice, "")
        .await
        .unwrap();
    assert_eq!(same, TransferResult::SameAccount);

    let negative = svc
        .accounts
        .transfer(&checking.account_number, &savings.account_number, -5, alice, "")
        .await
        .unwrap();
    assert_eq!(negative, TransferResult::InvalidAmount);

    let broke = svc
        .accounts
        .transfer(&checking.account_number, &savings.account_number, 20_000, alice, "")
        .await
        .unwrap();
    assert_eq!(broke, TransferResult::InsufficientFunds);

    let missing = svc
        .accounts
        .transfer(&checking.account_number, "0000000000", 100, alice, "")
        .await
        .unwrap();
    assert_eq!(missing, TransferResult::ToAccountNotFound);

    assert_eq!(svc.accounts.balance(&checking.account_number).await.unwrap(), 10_000);
}

#[tokio::test]
async fn business_accounts_may_overdraw_up_to_the_limit() {
    let svc = services();
    // Default config grants business accounts a 50_000-cent overdraft line
    let (bob, business) = funded_account(&svc, AccountType::Business, 0).await;

    let first = svc
        .accounts
        .withdraw(&business.account_number, 30_000, bob, "payroll")
        .await
        .unwrap();
    assert_eq!(first, WithdrawalResult::Success);
    assert_eq!(svc.accounts.balance(&business.account_number).await.unwrap(), -30_000);

    let second = svc
        .accounts
        .withdraw(&business.account_number, 30_000, bob, "payroll")
        .await
        .unwrap();
    assert_eq!(second, WithdrawalResult::InsufficientFunds);
}

#[tokio::test]
async fn checking_accounts_never_overdraw() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 1_000).await;

    let result = svc
        .accounts
        .withdraw(&checking.account_number, 1_001, alice, "")
        .await
        .unwrap();
    assert_eq!(result, WithdrawalResult::InsufficientFunds);
    assert_eq!(svc.accounts.balance(&checking.account_number).await.unwrap(), 1_000);
}

#[tokio::test]
async fn daily_withdrawal_ceiling_is_enforced() {
    let svc = services();
    // Checking caps daily withdrawals at 1_000_000 cents
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 2_000_000).await;

    let first = svc
        .accounts
        .withdraw(&checking.account_number, 900_000, alice, "")
        .await
        .unwrap();
    assert_eq!(first, WithdrawalResult::Success);

    let second = svc
        .accounts
        .withdraw(&checking.account_number, 200_000, alice, "")
        .await
        .unwrap();
    assert_eq!(second, WithdrawalResult::DailyLimitExceeded);

    let third = svc
        .accounts
        .withdraw(&checking.account_number, 100_000, alice, "")
        .await
        .unwrap();
    assert_eq!(third, WithdrawalResult::Success);
}

#[tokio::test]
async fn one_account_per_type_except_wallets() {
    let svc = services();
    let (alice, _) = funded_account(&svc, AccountType::Checking, 0).await;

    let dup = svc
        .accounts
        .open_account(alice, AccountType::Checking, 0, "")
        .await;
    assert!(matches!(dup, Err(LedgerError::DuplicateAccount)));

    svc.accounts
        .open_account(alice, AccountType::Wallet, 0, "pocket one")
        .await
        .unwrap();
    svc.accounts
        .open_account(alice, AccountType::Wallet, 0, "pocket two")
        .await
        .unwrap();
    assert_eq!(svc.accounts.accounts_by_owner(alice).await.len(), 3);
}

#[tokio::test]
async fn frozen_accounts_reject_mutation_and_freeze_is_idempotent() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 5_000).await;

    svc.accounts.freeze_account(&checking.account_number).await.unwrap();
    svc.accounts.freeze_account(&checking.account_number).await.unwrap();

    let deposit = svc
        .accounts
        .deposit(&checking.account_number, 100, alice, "")
        .await;
    assert!(matches!(deposit, Err(LedgerError::AccountFrozen)));

    let withdrawal = svc
        .accounts
        .withdraw(&checking.account_number, 100, alice, "")
        .await
        .unwrap();
    assert_eq!(withdrawal, WithdrawalResult::AccountFrozen);

    svc.accounts.unfreeze_account(&checking.account_number).await.unwrap();
    svc.accounts
        .deposit(&checking.account_number, 100, alice, "")
        .await
        .unwrap();
    assert_eq!(svc.accounts.balance(&checking.account_number).await.unwrap(), 5_100);
}

#[tokio::test]
async fn close_requires_zero_balance() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 500).await;

    let close = svc.accounts.close_account(&checking.account_number).await;
    assert!(matches!(close, Err(LedgerError::InvalidRequest(_))));

    let result = svc
        .accounts
        .withdraw(&checking.account_number, 500, alice, "emptying")
        .await
        .unwrap();
    assert_eq!(result, WithdrawalResult::Success);

    svc.accounts.close_account(&checking.account_number).await.unwrap();
    assert!(matches!(
        svc.accounts.account(&checking.account_number).await,
        Err(LedgerError::AccountNotFound)
    ));
}

#[tokio::test]
async fn primary_account_resolution_follows_configured_order() {
    let svc = services();
    let alice = Uuid::new_v4();

    // Wallet exists first, but the default order prefers checking
    svc.accounts
        .open_account(alice, AccountType::Wallet, 0, "")
        .await
        .unwrap();
    let primary = svc.accounts.primary_account(alice).await.unwrap();
    assert_eq!(primary.account_type, AccountType::Wallet);

    let checking = svc
        .accounts
        .open_account(alice, AccountType::Checking, 0, "")
        .await
        .unwrap();
    let primary = svc.accounts.primary_account(alice).await.unwrap();
    assert_eq!(primary.account_number, checking.account_number);
}

#[tokio::test]
async fn concurrent_withdrawals_never_overdraw() {
    let svc = Arc::new(services());
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 10_000).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let svc = svc.clone();
        let number = checking.account_number.clone();
        handles.push(tokio::spawn(async move {
            svc.accounts.withdraw(&number, 3_000, alice, "race").await.unwrap()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() == WithdrawalResult::Success {
            successes += 1;
        }
    }

    // 10_000 cents covers exactly three 3_000-cent withdrawals
    assert_eq!(successes, 3);
    assert_eq!(svc.accounts.balance(&checking.account_number).await.unwrap(), 1_000);
}

#[tokio::test]
async fn unknown_account_numbers_never_grow_the_lock_registry() {
    let svc = services();
    let (alice, checking) = funded_account(&svc, AccountType::Checking, 1_000).await;

    svc.accounts
        .withdraw(&checking.account_number, 500, alice, "coffee")
        .await
        .unwrap();
    assert_eq!(svc.store.locks().len(), 1);

    let bogus = svc.accounts.withdraw("0000000000", 100, alice, "x").await;
    assert!(matches!(bogus, Err(LedgerError::AccountNotFound)));
    let bogus = svc.accounts.deposit("0000000000", 100, alice, "x").await;
    assert!(matches!(bogus, Err(LedgerError::AccountNotFound)));
    let transfer = svc
        .accounts
        .transfer(&checking.account_number, "0000000000", 100, alice, "x")
        .await
        .unwrap();
    assert_eq!(transfer, TransferResult::ToAccountNotFound);

    // Rejected lookups left no trace in the registry
    assert_eq!(svc.store.locks().len(), 1);

    svc.accounts
        .withdraw(&checking.account_number, 500, alice, "the rest")
        .await
        .unwrap();
    svc.accounts.close_account(&checking.account_number).await.unwrap();
    assert_eq!(svc.store.locks().len(), 0);
}
