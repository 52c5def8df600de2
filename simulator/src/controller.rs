//! Simulation controller.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use walletcore_common::{AccountId, LedgerError, OwnerId};
use walletcore_engine::{EngineConfig, LedgerEngine};
use walletcore_store::{MemoryStore, OperationKind, StoreConfig};

use crate::metrics::SimulationMetrics;
use crate::scenario::{Scenario, ScenarioStep};

/// Controls the simulation.
pub struct SimulationController {
    /// Number of accounts to seed.
    account_count: usize,
    /// Balance each account starts with.
    initial_balance: Decimal,
    /// Base seed for worker RNGs.
    seed: Option<u64>,
    /// Backing store.
    store: MemoryStore,
    /// Engine under test.
    engine: Arc<LedgerEngine<MemoryStore>>,
    /// Seeded account IDs, in creation order.
    accounts: Vec<AccountId>,
    /// Run metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Net committed deposits minus withdrawals, in cents. Transfers net to
    /// zero, so the expected total is seeded funds plus this.
    net_cents: Arc<AtomicI64>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(account_count: usize, initial_balance: Decimal, seed: Option<u64>) -> Self {
        let store = MemoryStore::new(StoreConfig::default());
        let engine = Arc::new(LedgerEngine::new(
            Arc::new(store.clone()),
            EngineConfig::from_env(),
        ));

        Self {
            account_count,
            initial_balance,
            seed,
            store,
            engine,
            accounts: Vec::new(),
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            net_cents: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Seed the accounts.
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        info!(
            accounts = self.account_count,
            initial_balance = %self.initial_balance,
            "Seeding accounts"
        );

        for _ in 0..self.account_count {
            let account = self
                .store
                .create_account(OwnerId::new(), self.initial_balance);
            self.accounts.push(account.id);
        }

        Ok(())
    }

    /// Run random concurrent load for `duration`.
    pub async fn run_load(&self, workers: usize, duration: Duration) -> anyhow::Result<()> {
        anyhow::ensure!(!self.accounts.is_empty(), "no accounts seeded");
        info!(workers, duration_secs = duration.as_secs(), "Starting load");

        let deadline = Instant::now() + duration;
        let mut handles = Vec::new();

        for worker in 0..workers {
            let engine = self.engine.clone();
            let accounts = self.accounts.clone();
            let metrics = self.metrics.clone();
            let net_cents = self.net_cents.clone();
            let mut rng = match self.seed {
                Some(base) => StdRng::seed_from_u64(base.wrapping_add(worker as u64)),
                None => StdRng::from_entropy(),
            };

            handles.push(tokio::spawn(async move {
                while Instant::now() < deadline {
                    let cents = rng.gen_range(1..=20_000i64);
                    let amount = Decimal::new(cents, 2);
                    let started = Instant::now();

                    let (result, net_delta) = match rng.gen_range(0..4u8) {
                        0 => {
                            let id = accounts[rng.gen_range(0..accounts.len())];
                            let result = engine
                                .apply_operation(id, OperationKind::Deposit, amount)
                                .await
                                .map(|_| ());
                            (result, cents)
                        }
                        1 => {
                            let id = accounts[rng.gen_range(0..accounts.len())];
                            let result = engine
                                .apply_operation(id, OperationKind::Withdraw, amount)
                                .await
                                .map(|_| ());
                            (result, -cents)
                        }
                        _ if accounts.len() >= 2 => {
                            let from = rng.gen_range(0..accounts.len());
                            let mut to = rng.gen_range(0..accounts.len());
                            while to == from {
                                to = rng.gen_range(0..accounts.len());
                            }
                            let result =
                                engine.transfer(accounts[from], accounts[to], amount).await;
                            (result, 0)
                        }
                        _ => continue,
                    };

                    let latency_ms = started.elapsed().as_millis() as u64;
                    let mut metrics = metrics.write().await;
                    match result {
                        Ok(()) => {
                            metrics.record_success(latency_ms);
                            net_cents.fetch_add(net_delta, Ordering::SeqCst);
                        }
                        Err(LedgerError::InsufficientFunds { .. }) => {
                            metrics.record_insufficient_funds();
                        }
                        Err(LedgerError::Conflict { .. }) => {
                            metrics.record_conflict();
                        }
                        Err(err) => {
                            warn!(error = %err, "unexpected operation failure");
                            metrics.record_failure();
                        }
                    }
                }
            }));
        }

        join_all(handles).await;
        Ok(())
    }

    /// Run a named scenario step by step.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<()> {
        info!(name = %scenario.name, "Running scenario");

        for step in &scenario.steps {
            match step {
                ScenarioStep::Wait { millis } => {
                    tokio::time::sleep(Duration::from_millis(*millis)).await;
                }
                ScenarioStep::Deposit { account, amount } => {
                    let id = self.account_at(*account)?;
                    let amount = parse_amount(amount)?;
                    self.timed_operation(id, OperationKind::Deposit, amount)
                        .await?;
                }
                ScenarioStep::Withdraw { account, amount } => {
                    let id = self.account_at(*account)?;
                    let amount = parse_amount(amount)?;
                    self.timed_operation(id, OperationKind::Withdraw, amount)
                        .await?;
                }
                ScenarioStep::Transfer { from, to, amount } => {
                    let from = self.account_at(*from)?;
                    let to = self.account_at(*to)?;
                    let amount = parse_amount(amount)?;
                    let started = Instant::now();
                    self.engine
                        .transfer(from, to, amount)
                        .await
                        .with_context(|| format!("transfer of {amount} failed"))?;
                    self.metrics
                        .write()
                        .await
                        .record_success(started.elapsed().as_millis() as u64);
                }
                ScenarioStep::TransferStorm {
                    a,
                    b,
                    rounds,
                    amount,
                } => {
                    let a = self.account_at(*a)?;
                    let b = self.account_at(*b)?;
                    let amount = parse_amount(amount)?;
                    self.transfer_storm(a, b, *rounds, amount).await?;
                }
                ScenarioStep::AssertBalance { account, amount } => {
                    let id = self.account_at(*account)?;
                    let expected = parse_amount(amount)?;
                    let actual = self.engine.get_balance(id).await?;
                    anyhow::ensure!(
                        actual == expected,
                        "balance assertion failed for account {id}: expected {expected}, found {actual}"
                    );
                }
            }
        }

        Ok(())
    }

    /// Fire `rounds` opposite-direction transfer pairs concurrently.
    async fn transfer_storm(
        &self,
        a: AccountId,
        b: AccountId,
        rounds: usize,
        amount: Decimal,
    ) -> anyhow::Result<()> {
        let mut handles = Vec::new();
        for _ in 0..rounds {
            for (from, to) in [(a, b), (b, a)] {
                let engine = self.engine.clone();
                handles.push(tokio::spawn(async move {
                    engine.transfer(from, to, amount).await
                }));
            }
        }

        let started = Instant::now();
        for outcome in join_all(handles).await {
            let mut metrics = self.metrics.write().await;
            match outcome? {
                Ok(()) => metrics.record_success(started.elapsed().as_millis() as u64),
                Err(LedgerError::InsufficientFunds { .. }) => metrics.record_insufficient_funds(),
                Err(LedgerError::Conflict { .. }) => metrics.record_conflict(),
                Err(err) => return Err(err).context("transfer storm failed"),
            }
        }

        Ok(())
    }

    async fn timed_operation(
        &self,
        id: AccountId,
        kind: OperationKind,
        amount: Decimal,
    ) -> anyhow::Result<()> {
        let started = Instant::now();
        self.engine
            .apply_operation(id, kind, amount)
            .await
            .with_context(|| format!("{kind:?} of {amount} on {id} failed"))?;
        let cents = (amount * Decimal::new(100, 0)).normalize().mantissa();
        let cents = i64::try_from(cents).unwrap_or(0);
        self.net_cents.fetch_add(
            match kind {
                OperationKind::Deposit => cents,
                OperationKind::Withdraw => -cents,
            },
            Ordering::SeqCst,
        );
        self.metrics
            .write()
            .await
            .record_success(started.elapsed().as_millis() as u64);
        Ok(())
    }

    fn account_at(&self, index: usize) -> anyhow::Result<AccountId> {
        self.accounts
            .get(index)
            .copied()
            .with_context(|| format!("scenario references unseeded account index {index}"))
    }

    /// Verify the run invariants: total funds conserved (adjusted by net
    /// committed deposits/withdrawals) and no balance negative.
    pub async fn verify(&self) -> anyhow::Result<()> {
        let seeded_total =
            self.initial_balance * Decimal::new(self.account_count as i64, 0);
        let expected = seeded_total + Decimal::new(self.net_cents.load(Ordering::SeqCst), 2);
        let actual = self.store.total_balance();

        anyhow::ensure!(
            actual == expected,
            "conservation violated: expected total {expected}, found {actual}"
        );

        for id in self.store.account_ids() {
            let balance = self.engine.get_balance(id).await?;
            anyhow::ensure!(
                balance >= Decimal::ZERO,
                "negative balance {balance} on account {id}"
            );
        }

        info!(total = %actual, "Invariants verified");
        Ok(())
    }

    /// Get a snapshot of the run metrics.
    pub async fn metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }
}

fn parse_amount(raw: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str_exact(raw).with_context(|| format!("invalid amount {raw:?}"))
}
