//! In-memory account store with per-account exclusive row locks.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::debug;

use walletcore_common::{constants, AccountId, LedgerError, OwnerId, Result};

use crate::account::Account;
use crate::entry::LedgerEntry;
use crate::traits::{AccountStore, StoreUnitOfWork};

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a unit of work waits for an exclusive row lock before the
    /// acquisition fails with a retryable timeout.
    pub lock_wait_timeout: std::time::Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_wait_timeout: constants::default_lock_wait_timeout(),
        }
    }
}

impl StoreConfig {
    /// Validate configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.lock_wait_timeout.is_zero() {
            return Err("Lock wait timeout cannot be zero".to_string());
        }
        Ok(())
    }
}

/// Per-account storage slot: the row lock, the committed record, and the
/// account's entry history.
#[derive(Clone)]
struct Slot {
    row_lock: Arc<RowLock<()>>,
    record: Arc<RwLock<Account>>,
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
}

impl Slot {
    fn new(account: Account) -> Self {
        Self {
            row_lock: Arc::new(RowLock::new(())),
            record: Arc::new(RwLock::new(account)),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

struct StoreInner {
    accounts: DashMap<AccountId, Slot>,
    config: StoreConfig,
    /// Errors to be returned by upcoming commits instead of applying them.
    /// Test hook mirroring storage-layer aborts (lock timeouts, deadlock
    /// detection, I/O failures).
    queued_commit_failures: Mutex<VecDeque<LedgerError>>,
}

/// In-memory [`AccountStore`] implementation.
///
/// Each account row carries its own exclusive lock; lock acquisition is
/// bounded by [`StoreConfig::lock_wait_timeout`]. Writes and entry appends
/// are staged inside a unit of work and applied while every touched row
/// lock is still held, so a commit is atomic across all of them.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Create a new store with the given configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                accounts: DashMap::new(),
                config,
                queued_commit_failures: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Seed a new account. Account creation belongs to onboarding flows and
    /// is not part of the engine-facing surface.
    pub fn create_account(&self, owner_id: OwnerId, initial_balance: Decimal) -> Account {
        let account = Account::new(owner_id, initial_balance);
        self.inner
            .accounts
            .insert(account.id, Slot::new(account.clone()));
        account
    }

    /// All account IDs currently in the store.
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.inner.accounts.iter().map(|e| *e.key()).collect()
    }

    /// Entry history for an account, in insertion order. Audit read; empty
    /// for unknown accounts.
    pub fn entries_for(&self, account_id: AccountId) -> Vec<LedgerEntry> {
        self.inner
            .accounts
            .get(&account_id)
            .map(|slot| slot.entries.read().clone())
            .unwrap_or_default()
    }

    /// Sum of all committed balances.
    pub fn total_balance(&self) -> Decimal {
        self.inner
            .accounts
            .iter()
            .map(|e| e.value().record.read().balance)
            .sum()
    }

    /// Queue an error for the next commit to return instead of applying.
    /// The failed unit of work leaves all committed state unchanged and
    /// releases its locks.
    pub fn queue_commit_failure(&self, error: LedgerError) {
        self.inner.queued_commit_failures.lock().push_back(error);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    type Uow = MemoryUnitOfWork;

    fn begin(&self) -> MemoryUnitOfWork {
        MemoryUnitOfWork {
            inner: self.inner.clone(),
            guards: Vec::new(),
            staged_writes: Vec::new(),
            staged_entries: Vec::new(),
            finished: false,
        }
    }

    async fn read(&self, id: AccountId) -> Result<Account> {
        match self.inner.accounts.get(&id) {
            Some(slot) => Ok(slot.record.read().clone()),
            None => Err(LedgerError::NotFound(id)),
        }
    }
}

struct StagedWrite {
    account: Account,
    expected_revision: Option<u64>,
}

/// Unit of work over a [`MemoryStore`].
///
/// Dropping without committing rolls back: staged state is discarded and
/// all row locks are released.
pub struct MemoryUnitOfWork {
    inner: Arc<StoreInner>,
    guards: Vec<(AccountId, OwnedMutexGuard<()>)>,
    staged_writes: Vec<StagedWrite>,
    staged_entries: Vec<LedgerEntry>,
    finished: bool,
}

impl MemoryUnitOfWork {
    fn holds_lock(&self, id: AccountId) -> bool {
        self.guards.iter().any(|(held, _)| *held == id)
    }

    fn stage(&mut self, account: Account, expected_revision: Option<u64>) {
        if let Some(existing) = self
            .staged_writes
            .iter_mut()
            .find(|w| w.account.id == account.id)
        {
            *existing = StagedWrite {
                account,
                expected_revision,
            };
        } else {
            self.staged_writes.push(StagedWrite {
                account,
                expected_revision,
            });
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.staged_writes.clear();
        self.staged_entries.clear();
        self.guards.clear();
    }

    fn try_commit(&mut self) -> Result<()> {
        if let Some(error) = self.inner.queued_commit_failures.lock().pop_front() {
            return Err(error);
        }

        for staged in &self.staged_writes {
            if !self.holds_lock(staged.account.id) {
                return Err(LedgerError::Internal(format!(
                    "write to account {} without holding its row lock",
                    staged.account.id
                )));
            }
        }
        for entry in &self.staged_entries {
            if !self.holds_lock(entry.account_id) {
                return Err(LedgerError::Internal(format!(
                    "entry append to account {} without holding its row lock",
                    entry.account_id
                )));
            }
        }

        // Revision checks run before anything is applied, so a conflict
        // leaves the whole unit of work unapplied.
        for staged in &self.staged_writes {
            if let Some(expected) = staged.expected_revision {
                let slot = self.slot(staged.account.id)?;
                let actual = slot.record.read().revision;
                if actual != expected {
                    return Err(LedgerError::RevisionConflict {
                        account_id: staged.account.id,
                        expected,
                        actual,
                    });
                }
            }
        }

        for staged in self.staged_writes.drain(..) {
            let slot = match self.inner.accounts.get(&staged.account.id) {
                Some(slot) => slot.value().clone(),
                None => {
                    return Err(LedgerError::Internal(format!(
                        "locked account {} vanished before commit",
                        staged.account.id
                    )))
                }
            };
            *slot.record.write() = staged.account;
        }
        for entry in self.staged_entries.drain(..) {
            let slot = match self.inner.accounts.get(&entry.account_id) {
                Some(slot) => slot.value().clone(),
                None => {
                    return Err(LedgerError::Internal(format!(
                        "locked account {} vanished before commit",
                        entry.account_id
                    )))
                }
            };
            slot.entries.write().push(entry);
        }

        Ok(())
    }

    fn slot(&self, id: AccountId) -> Result<Slot> {
        match self.inner.accounts.get(&id) {
            Some(slot) => Ok(slot.value().clone()),
            None => Err(LedgerError::NotFound(id)),
        }
    }
}

#[async_trait]
impl StoreUnitOfWork for MemoryUnitOfWork {
    async fn lock_and_read(&mut self, id: AccountId) -> Result<Account> {
        if self.finished {
            return Err(LedgerError::Internal(
                "unit of work already finished".to_string(),
            ));
        }
        if self.holds_lock(id) {
            return Err(LedgerError::Internal(format!(
                "account {id} already locked in this unit of work"
            )));
        }

        // Existence check happens before any lock attempt.
        let slot = self.slot(id)?;

        let guard = tokio::time::timeout(
            self.inner.config.lock_wait_timeout,
            slot.row_lock.clone().lock_owned(),
        )
        .await
        .map_err(|_| LedgerError::LockWaitTimeout(id))?;

        self.guards.push((id, guard));
        debug!(account_id = %id, "row lock acquired");

        let record = slot.record.read().clone();
        Ok(record)
    }

    fn write(&mut self, account: Account) {
        self.stage(account, None);
    }

    fn write_checked(&mut self, account: Account, expected_revision: u64) {
        self.stage(account, Some(expected_revision));
    }

    fn append_entry(&mut self, entry: LedgerEntry) {
        self.staged_entries.push(entry);
    }

    async fn commit(&mut self) -> Result<()> {
        if self.finished {
            return Err(LedgerError::Internal(
                "unit of work already finished".to_string(),
            ));
        }
        // Apply while every row lock is still held; finish releases them.
        let outcome = self.try_commit();
        self.finish();
        outcome
    }

    fn rollback(&mut self) {
        if !self.finished {
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::OperationKind;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn store_with_timeout(ms: u64) -> MemoryStore {
        MemoryStore::new(StoreConfig {
            lock_wait_timeout: std::time::Duration::from_millis(ms),
        })
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let store = MemoryStore::default();
        let account = store.create_account(OwnerId::new(), dec("1000.00"));

        let read = store.read(account.id).await.unwrap();
        assert_eq!(read.balance, dec("1000.00"));
        assert_eq!(read.revision, 0);
    }

    #[tokio::test]
    async fn test_read_unknown_account() {
        let store = MemoryStore::default();
        let missing = AccountId::new();

        let err = store.read(missing).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_lock_and_read_unknown_account() {
        let store = MemoryStore::default();
        let missing = AccountId::new();

        let mut uow = store.begin();
        let err = uow.lock_and_read(missing).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_commit_applies_write_and_entry_together() {
        let store = MemoryStore::default();
        let account = store.create_account(OwnerId::new(), dec("1000.00"));

        let mut uow = store.begin();
        let mut locked = uow.lock_and_read(account.id).await.unwrap();
        locked.deposit(dec("100.00"));
        uow.write(locked);
        uow.append_entry(LedgerEntry::deposit(account.id, dec("100.00")));
        uow.commit().await.unwrap();

        let read = store.read(account.id).await.unwrap();
        assert_eq!(read.balance, dec("1100.00"));
        assert_eq!(read.revision, 1);

        let entries = store.entries_for(account.id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, OperationKind::Deposit);
        assert_eq!(entries[0].amount, dec("100.00"));
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_state() {
        let store = MemoryStore::default();
        let account = store.create_account(OwnerId::new(), dec("1000.00"));

        let mut uow = store.begin();
        let mut locked = uow.lock_and_read(account.id).await.unwrap();
        locked.withdraw(dec("400.00"));
        uow.write(locked);
        uow.append_entry(LedgerEntry::withdraw(account.id, dec("400.00")));
        uow.rollback();

        let read = store.read(account.id).await.unwrap();
        assert_eq!(read.balance, dec("1000.00"));
        assert!(store.entries_for(account.id).is_empty());
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = MemoryStore::default();
        let account = store.create_account(OwnerId::new(), dec("1000.00"));

        {
            let mut uow = store.begin();
            let mut locked = uow.lock_and_read(account.id).await.unwrap();
            locked.deposit(dec("1.00"));
            uow.write(locked);
        }

        let read = store.read(account.id).await.unwrap();
        assert_eq!(read.balance, dec("1000.00"));

        // The row lock was released with the dropped unit of work.
        let mut uow = store.begin();
        assert!(uow.lock_and_read(account.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_wait_timeout_surfaces_as_retryable() {
        let store = store_with_timeout(20);
        let account = store.create_account(OwnerId::new(), dec("1000.00"));

        let mut holder = store.begin();
        holder.lock_and_read(account.id).await.unwrap();

        let mut waiter = store.begin();
        let err = waiter.lock_and_read(account.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::LockWaitTimeout(id) if id == account.id));
        assert!(err.is_retryable());

        holder.rollback();
        let mut retry = store.begin();
        assert!(retry.lock_and_read(account.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_queued_commit_failure_leaves_state_unchanged() {
        let store = MemoryStore::default();
        let account = store.create_account(OwnerId::new(), dec("1000.00"));
        store.queue_commit_failure(LedgerError::Storage("disk gone".to_string()));

        let mut uow = store.begin();
        let mut locked = uow.lock_and_read(account.id).await.unwrap();
        locked.deposit(dec("500.00"));
        uow.write(locked);
        uow.append_entry(LedgerEntry::deposit(account.id, dec("500.00")));

        let err = uow.commit().await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));

        let read = store.read(account.id).await.unwrap();
        assert_eq!(read.balance, dec("1000.00"));
        assert!(store.entries_for(account.id).is_empty());

        // Locks were released despite the failed commit.
        let mut retry = store.begin();
        assert!(retry.lock_and_read(account.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_revision_checked_write_detects_stale_revision() {
        let store = MemoryStore::default();
        let account = store.create_account(OwnerId::new(), dec("1000.00"));

        // Another writer commits first, bumping the revision.
        let mut first = store.begin();
        let mut locked = first.lock_and_read(account.id).await.unwrap();
        locked.deposit(dec("10.00"));
        first.write(locked);
        first.commit().await.unwrap();

        // A stale writer asserts revision 0 and must be rejected.
        let mut stale = store.begin();
        let mut record = stale.lock_and_read(account.id).await.unwrap();
        record.deposit(dec("999.00"));
        record.revision = 1;
        stale.write_checked(record, 0);
        let err = stale.commit().await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::RevisionConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));

        let read = store.read(account.id).await.unwrap();
        assert_eq!(read.balance, dec("1010.00"));
    }

    #[tokio::test]
    async fn test_revision_checked_write_with_current_revision_commits() {
        let store = MemoryStore::default();
        let account = store.create_account(OwnerId::new(), dec("1000.00"));

        let mut uow = store.begin();
        let mut locked = uow.lock_and_read(account.id).await.unwrap();
        let expected = locked.revision;
        locked.deposit(dec("25.00"));
        uow.write_checked(locked, expected);
        uow.commit().await.unwrap();

        let read = store.read(account.id).await.unwrap();
        assert_eq!(read.balance, dec("1025.00"));
    }

    #[tokio::test]
    async fn test_commit_twice_is_an_error() {
        let store = MemoryStore::default();
        let account = store.create_account(OwnerId::new(), dec("1000.00"));

        let mut uow = store.begin();
        uow.lock_and_read(account.id).await.unwrap();
        uow.commit().await.unwrap();

        let err = uow.commit().await.unwrap_err();
        assert!(matches!(err, LedgerError::Internal(_)));
    }

    #[tokio::test]
    async fn test_total_balance() {
        let store = MemoryStore::default();
        store.create_account(OwnerId::new(), dec("1000.00"));
        store.create_account(OwnerId::new(), dec("250.50"));

        assert_eq!(store.total_balance(), dec("1250.50"));
    }
}
