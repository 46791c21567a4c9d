//! Demo driver for the ledger core.
//!
//! Wires the service graph, subscribes to the event stream, and walks one
//! customer through a representative session: open accounts, move money,
//! issue and use a card, take out a loan, and hit an ATM. Emitted events are
//! printed as JSON as they arrive.

use tracing_subscriber::EnvFilter;

use uuid::Uuid;

use ledger_core::models::account::AccountType;
use ledger_core::models::card::CardType;
use ledger_core::models::loan::LoanType;
use ledger_core::{Config, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let services = Services::new(&config);

    // Print every domain event as it happens
    let mut events = services.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                println!("event: {json}");
            }
        }
    });

    let alice = Uuid::new_v4();

    // Accounts
    let checking = services
        .accounts
        .open_account(alice, AccountType::Checking, 100_000, "")
        .await?;
    let savings = services
        .accounts
        .open_account(alice, AccountType::Savings, 50_000, "Rainy day")
        .await?;
    tracing::info!(checking = %checking.account_number, savings = %savings.account_number, "accounts opened");

    let transfer = services
        .accounts
        .transfer(
            &checking.account_number,
            &savings.account_number,
            25_000,
            alice,
            "Monthly savings",
        )
        .await?;
    tracing::info!(?transfer, "transfer attempted");

    // Card
    let card = services
        .cards
        .issue_card(alice, &checking.account_number, CardType::Debit, "4321")
        .await?;
    let purchase = services
        .cards
        .authorize(&card.card_number, "4321", 1_999, "Coffee shop")
        .await?;
    tracing::info!(card = %card.masked_number(), ?purchase, "card purchase attempted");

    // Loan
    let loan = services
        .loans
        .apply(alice, &checking.account_number, LoanType::Personal, 120_000, 12, None)
        .await?;
    services.loans.approve(&loan.loan_id).await?;
    services.loans.disburse(&loan.loan_id).await?;
    services.loans.make_payment(&loan.loan_id, None).await?;

    // ATM
    let atm = services.atms.create_atm("downtown", alice).await?;
    let withdrawal = services
        .atms
        .withdraw(&atm.atm_id, &checking.account_number, 10_000, alice)
        .await?;
    tracing::info!(?withdrawal, "ATM withdrawal attempted");

    // Scheduled maintenance runs in the background from here on
    let handle = services.scheduler.clone().spawn();

    let history = services
        .transactions
        .history(&checking.account_number, 50)
        .await;
    println!("--- transaction history ({}) ---", history.len());
    for tx in &history {
        println!("{}", serde_json::to_string(tx)?);
    }

    let balance = services.accounts.balance(&checking.account_number).await?;
    println!("final checking balance: {balance} cents");

    handle.abort();
    Ok(())
}
