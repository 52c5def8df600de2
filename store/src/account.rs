//! Account record for the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use walletcore_common::{AccountId, OwnerId};

/// A ledger account.
///
/// Mutated exclusively by the ledger engine while the account's row lock is
/// held inside a unit of work. The balance is never negative between
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: AccountId,
    /// Owning user, opaque to the ledger core.
    pub owner_id: OwnerId,
    /// Current balance, fixed-point with two fractional digits.
    pub balance: Decimal,
    /// Monotonically increasing revision counter, bumped on every mutation.
    /// Not consulted by the pessimistic locking path; kept for revision-checked
    /// writes.
    pub revision: u64,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with an initial balance.
    pub fn new(owner_id: OwnerId, initial_balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            owner_id,
            balance: initial_balance,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the balance covers a withdrawal of `amount`.
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Add `amount` to the balance.
    pub fn deposit(&mut self, amount: Decimal) {
        self.balance += amount;
        self.touch();
    }

    /// Subtract `amount` from the balance. The caller validates funds first.
    pub fn withdraw(&mut self, amount: Decimal) {
        self.balance -= amount;
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}
