// draftflow/src/transaction/mod.rs

//! Isolation-level-aware transaction execution with bounded retries.

pub mod isolation;
pub mod manager;
pub mod profile;

pub use isolation::IsolationLevel;
pub use manager::{TransactionManager, TxFuture};
pub use profile::{TransactionConfig, TransactionProfile, TransactionProfiles};
