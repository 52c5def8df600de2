//! Storage seam consumed by the ledger engine.

use async_trait::async_trait;

use walletcore_common::{AccountId, Result};

use crate::account::Account;
use crate::entry::LedgerEntry;

/// Durable storage of accounts and ledger entries.
///
/// All mutation happens through a unit of work obtained from [`begin`];
/// `read` is an unlocked point-in-time read with no side effects.
///
/// [`begin`]: AccountStore::begin
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Unit-of-work type produced by this store.
    type Uow: StoreUnitOfWork;

    /// Open a unit of work. Nothing is locked until the first
    /// [`StoreUnitOfWork::lock_and_read`].
    fn begin(&self) -> Self::Uow;

    /// Unlocked read of an account. May observe a balance mid-flight while
    /// a concurrent unit of work is committing.
    async fn read(&self, id: AccountId) -> Result<Account>;
}

/// A bounded span of storage operations that commits or rolls back
/// atomically.
///
/// Row locks acquired by `lock_and_read` are scoped to the unit of work and
/// released on commit or rollback. Writes and entry appends are staged and
/// only become visible at commit; a unit of work dropped without committing
/// rolls back.
#[async_trait]
pub trait StoreUnitOfWork: Send {
    /// Block until the exclusive row lock for `id` is granted, then read the
    /// current record. Fails with `NotFound` before any lock attempt when
    /// the account is absent, and with `LockWaitTimeout` when the lock-wait
    /// bound expires.
    async fn lock_and_read(&mut self, id: AccountId) -> Result<Account>;

    /// Stage a balance/revision write. Valid only for accounts whose row
    /// lock this unit of work holds.
    fn write(&mut self, account: Account);

    /// Stage a write that additionally asserts the committed record still
    /// carries `expected_revision` at commit time. Optional primitive for
    /// lock-free read paths; the pessimistic operations do not use it.
    fn write_checked(&mut self, account: Account, expected_revision: u64);

    /// Stage an append-only ledger entry. Valid only for accounts whose row
    /// lock this unit of work holds.
    fn append_entry(&mut self, entry: LedgerEntry);

    /// Atomically apply every staged write and append, then release all row
    /// locks. Either every effect becomes visible or none does.
    async fn commit(&mut self) -> Result<()>;

    /// Discard all staged effects and release all row locks.
    fn rollback(&mut self);
}
