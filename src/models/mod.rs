//! Entity definitions shared by the store and the services.

pub mod account;
pub mod atm;
pub mod card;
pub mod loan;
pub mod transaction;
