// Horizon-compatible ledger API
pub mod client;
pub mod models;

pub use client::{HorizonClient, LedgerClient};
