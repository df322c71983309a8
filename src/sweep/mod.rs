// Account sweeping: key derivation, discovery, composition, submission and the worker loop
pub mod composer;
pub mod discovery;
pub mod engine;
pub mod keys;
pub mod submitter;
pub mod worker;

#[cfg(test)]
pub mod testing;

pub use composer::{parse_address, TransactionComposer, MAX_MEMO_BYTES};
pub use engine::{SweepEngine, SweepJob};
pub use worker::BotHandle;
