//! Error taxonomy for walletcore ledger operations.

use crate::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for ledger operations.
///
/// Validation failures (`NotFound`, `InsufficientFunds`, `SameAccount`,
/// `InvalidAmount`) are terminal and never retried. Transient storage
/// conflicts (`LockWaitTimeout`, `DeadlockDetected`) are retried by the
/// engine and only surface as `Conflict` once the retry budget is spent.
/// Every failure leaves ledger state unchanged.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Account does not exist.
    #[error("account not found: {0}")]
    NotFound(AccountId),

    /// Withdrawal or transfer exceeds the source balance.
    #[error(
        "insufficient funds in account {account_id}: balance {balance}, requested {requested}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    /// Transfer source and destination are the same account.
    #[error("transfer source and destination are the same account: {0}")]
    SameAccount(AccountId),

    /// Amount is non-positive, too precise, or out of range.
    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Decimal, reason: String },

    /// Exclusive row lock was not granted within the lock-wait timeout.
    #[error("lock wait timed out for account {0}")]
    LockWaitTimeout(AccountId),

    /// The storage layer's own deadlock detector aborted the unit of work.
    #[error("deadlock detected by storage layer")]
    DeadlockDetected,

    /// Lock contention persisted past the retry budget.
    #[error("operation abandoned after {attempts} attempts due to lock contention")]
    Conflict { attempts: u32 },

    /// Revision-checked write observed a concurrent mutation.
    #[error("revision conflict on account {account_id}: expected {expected}, found {actual}")]
    RevisionConflict {
        account_id: AccountId,
        expected: u64,
        actual: u64,
    },

    /// Unclassified storage failure; fatal, never retried.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Engine invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Check if this error is transient lock contention worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::LockWaitTimeout(_) | LedgerError::DeadlockDetected
        )
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
