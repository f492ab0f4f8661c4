//! Adapters layer - implementations of the core ports
//!
//! The search cluster adapter lives in [`crate::client`]; this module holds
//! the ledger state sources.

pub mod accounts;

pub use accounts::InMemoryAccounts;
