//! Service layer.
//!
//! Each service owns one domain (accounts, cards, loans, cash dispensers,
//! transaction log, scheduled maintenance) and receives its collaborators
//! explicitly at construction. [`Services::new`] is the single place the
//! object graph is wired; nothing reaches for globals.

pub mod accounts;
pub mod atm;
pub mod cards;
pub mod loans;
pub mod numbers;
pub mod scheduler;
pub mod transactions;

use std::sync::Arc;

use crate::config::Config;
use crate::events::EventBus;
use crate::store::MemoryStore;

use accounts::AccountService;
use atm::AtmService;
use cards::CardService;
use loans::LoanService;
use numbers::NumberGenerator;
use scheduler::Scheduler;
use transactions::TransactionService;

/// The fully wired service graph.
pub struct Services {
    pub store: Arc<MemoryStore>,
    pub events: EventBus,
    pub numbers: Arc<NumberGenerator>,
    pub transactions: Arc<TransactionService>,
    pub accounts: Arc<AccountService>,
    pub cards: Arc<CardService>,
    pub loans: Arc<LoanService>,
    pub atms: Arc<AtmService>,
    pub scheduler: Arc<Scheduler>,
}

impl Services {
    pub fn new(config: &Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::default();
        let numbers = Arc::new(NumberGenerator::new(config.routing_number.clone()));

        let transactions = Arc::new(TransactionService::new(
            store.clone(),
            numbers.clone(),
            events.clone(),
        ));
        let accounts = Arc::new(AccountService::new(
            store.clone(),
            numbers.clone(),
            transactions.clone(),
            events.clone(),
            config,
        ));
        let cards = Arc::new(CardService::new(
            store.clone(),
            numbers.clone(),
            accounts.clone(),
            transactions.clone(),
            events.clone(),
            config.card_validity_months,
        ));
        let loans = Arc::new(LoanService::new(
            store.clone(),
            numbers.clone(),
            accounts.clone(),
            transactions.clone(),
            events.clone(),
            config,
        ));
        let atms = Arc::new(AtmService::new(
            store.clone(),
            numbers.clone(),
            accounts.clone(),
            transactions.clone(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            accounts.clone(),
            transactions.clone(),
            loans.clone(),
            config,
        ));

        Self {
            store,
            events,
            numbers,
            transactions,
            accounts,
            cards,
            loans,
            atms,
            scheduler,
        }
    }
}
