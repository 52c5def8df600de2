//! walletcore Ledger Engine
//!
//! Orchestrates single-account and cross-account balance mutations with
//! per-row exclusive locking, deadlock-free canonical lock ordering, atomic
//! units of work, and bounded retry with exponential backoff on transient
//! lock contention.

pub mod engine;
pub mod attempt;
pub mod retry;
pub mod config;

pub use engine::{canonical_lock_order, LedgerEngine};
pub use attempt::{AttemptPhase, AttemptTracker};
pub use retry::{with_retry, RetryPolicy};
pub use config::EngineConfig;
