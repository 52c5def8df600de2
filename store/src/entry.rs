//! Append-only ledger entry types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use walletcore_common::{AccountId, EntryId};

/// Kind of balance-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Increase the balance.
    Deposit,
    /// Decrease the balance.
    Withdraw,
}

/// An immutable record of a single balance-changing event on one account.
///
/// Exactly one entry is appended per single-account operation; a transfer
/// appends a `Withdraw` entry on the source and a `Deposit` entry on the
/// destination in the same unit of work as the balance writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID.
    pub id: EntryId,
    /// Account affected.
    pub account_id: AccountId,
    /// Operation kind.
    pub kind: OperationKind,
    /// Positive amount, two fractional digits.
    pub amount: Decimal,
    /// When this entry was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a deposit entry.
    pub fn deposit(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id, OperationKind::Deposit, amount)
    }

    /// Create a withdrawal entry.
    pub fn withdraw(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id, OperationKind::Withdraw, amount)
    }

    /// Create an entry of the given kind.
    pub fn new(account_id: AccountId, kind: OperationKind, amount: Decimal) -> Self {
        Self {
            id: EntryId::new(),
            account_id,
            kind,
            amount,
            created_at: Utc::now(),
        }
    }

    /// Get the signed balance effect (positive for deposit, negative for
    /// withdrawal).
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            OperationKind::Deposit => self.amount,
            OperationKind::Withdraw => -self.amount,
        }
    }
}
