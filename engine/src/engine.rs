//! Core ledger engine implementation.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use walletcore_common::{monetary, AccountId, LedgerError, Result};
use walletcore_store::{AccountStore, LedgerEntry, OperationKind, StoreUnitOfWork};

use crate::attempt::{AttemptPhase, AttemptTracker};
use crate::config::EngineConfig;
use crate::retry::with_retry;

/// Canonical, direction-independent lock order for a pair of accounts.
///
/// Returns the pair sorted by the `AccountId` total order; locks are always
/// acquired on the smaller identifier first, so two concurrent transfers
/// between the same accounts request locks in the same global order and
/// circular waits cannot form.
pub fn canonical_lock_order(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The ledger engine applies balance-changing operations against an
/// [`AccountStore`].
///
/// The engine holds no shared mutable state of its own; all coordination is
/// delegated to the store's row locks, held for the lifetime of one unit of
/// work. Balances are never cached across calls; every operation re-reads
/// current state inside its locking scope.
pub struct LedgerEngine<S: AccountStore> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: AccountStore> LedgerEngine<S> {
    /// Create a new engine over the given store.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Apply a deposit or withdrawal to a single account.
    ///
    /// Returns the post-operation balance. Exactly one ledger entry is
    /// appended, in the same unit of work as the balance write.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn apply_operation(
        &self,
        account_id: AccountId,
        kind: OperationKind,
        amount: Decimal,
    ) -> Result<Decimal> {
        self.validate_amount(amount)?;

        with_retry(&self.config.retry, "apply_operation", || {
            self.apply_attempt(account_id, kind, amount)
        })
        .await
    }

    /// Move `amount` between two accounts atomically.
    ///
    /// Both row locks are acquired in canonical order inside one unit of
    /// work; the debit, the credit and both ledger entries commit together
    /// or not at all. Transient lock contention is retried with exponential
    /// backoff before surfacing as [`LedgerError::Conflict`].
    #[instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn transfer(&self, from: AccountId, to: AccountId, amount: Decimal) -> Result<()> {
        if from == to {
            return Err(LedgerError::SameAccount(from));
        }
        self.validate_amount(amount)?;

        with_retry(&self.config.retry, "transfer", || {
            self.transfer_attempt(from, to, amount)
        })
        .await
    }

    /// Read an account's balance without locking. No side effects.
    pub async fn get_balance(&self, account_id: AccountId) -> Result<Decimal> {
        let account = self.store.read(account_id).await?;
        Ok(account.balance)
    }

    fn validate_amount(&self, amount: Decimal) -> Result<()> {
        if let Some(issue) =
            monetary::check_amount_in(amount, self.config.min_amount, self.config.max_amount)
        {
            return Err(LedgerError::InvalidAmount {
                amount,
                reason: issue.reason().to_string(),
            });
        }
        Ok(())
    }

    async fn apply_attempt(
        &self,
        account_id: AccountId,
        kind: OperationKind,
        amount: Decimal,
    ) -> Result<Decimal> {
        let mut uow = self.store.begin();
        let mut account = uow.lock_and_read(account_id).await?;

        if kind == OperationKind::Withdraw && !account.can_cover(amount) {
            let balance = account.balance;
            uow.rollback();
            return Err(LedgerError::InsufficientFunds {
                account_id,
                balance,
                requested: amount,
            });
        }

        match kind {
            OperationKind::Deposit => account.deposit(amount),
            OperationKind::Withdraw => account.withdraw(amount),
        }
        let new_balance = account.balance;

        uow.write(account);
        uow.append_entry(LedgerEntry::new(account_id, kind, amount));
        uow.commit().await?;

        info!(
            account_id = %account_id,
            kind = ?kind,
            amount = %amount,
            balance = %new_balance,
            "operation applied"
        );

        Ok(new_balance)
    }

    async fn transfer_attempt(&self, from: AccountId, to: AccountId, amount: Decimal) -> Result<()> {
        let mut attempt = AttemptTracker::new();
        let result = self.run_transfer(&mut attempt, from, to, amount).await;
        if result.is_err() {
            attempt.roll_back();
        }
        result
    }

    async fn run_transfer(
        &self,
        attempt: &mut AttemptTracker,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<()> {
        // Both accounts must exist before any lock attempt.
        self.store.read(from).await?;
        self.store.read(to).await?;
        attempt.advance(AttemptPhase::LockAcquiring)?;

        let mut uow = self.store.begin();
        let (first, second) = canonical_lock_order(from, to);
        let first_account = uow.lock_and_read(first).await?;
        let second_account = uow.lock_and_read(second).await?;

        let (mut source, mut destination) = if first == from {
            (first_account, second_account)
        } else {
            (second_account, first_account)
        };

        if !source.can_cover(amount) {
            let balance = source.balance;
            uow.rollback();
            return Err(LedgerError::InsufficientFunds {
                account_id: from,
                balance,
                requested: amount,
            });
        }
        attempt.advance(AttemptPhase::Applying)?;

        source.withdraw(amount);
        destination.deposit(amount);
        uow.write(source);
        uow.write(destination);
        uow.append_entry(LedgerEntry::withdraw(from, amount));
        uow.append_entry(LedgerEntry::deposit(to, amount));
        attempt.advance(AttemptPhase::Committing)?;

        uow.commit().await?;
        attempt.advance(AttemptPhase::Done)?;

        info!(from = %from, to = %to, amount = %amount, "transfer committed");
        Ok(())
    }
}
