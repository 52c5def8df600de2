//! Simulation scenarios.
//!
//! Accounts are referenced by their index in the seeded account list.

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Wait for a duration.
    Wait { millis: u64 },
    /// Deposit into an account.
    Deposit { account: usize, amount: String },
    /// Withdraw from an account.
    Withdraw { account: usize, amount: String },
    /// Transfer between two accounts.
    Transfer {
        from: usize,
        to: usize,
        amount: String,
    },
    /// Fire `rounds` pairs of opposite-direction transfers between two
    /// accounts concurrently.
    TransferStorm {
        a: usize,
        b: usize,
        rounds: usize,
        amount: String,
    },
    /// Assert an account's balance.
    AssertBalance { account: usize, amount: String },
}

impl Scenario {
    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "basic-operations" => Ok(Self::basic_operations()),
            "contention" => Ok(Self::contention()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Deposit, withdrawal and transfer against two accounts, with balance
    /// assertions after each step. Assumes accounts seeded at 1000.00.
    fn basic_operations() -> Self {
        Self {
            name: "basic-operations".to_string(),
            description: "Single deposits, withdrawals and a transfer".to_string(),
            steps: vec![
                ScenarioStep::Deposit {
                    account: 0,
                    amount: "100.00".to_string(),
                },
                ScenarioStep::AssertBalance {
                    account: 0,
                    amount: "1100.00".to_string(),
                },
                ScenarioStep::Withdraw {
                    account: 1,
                    amount: "900.00".to_string(),
                },
                ScenarioStep::AssertBalance {
                    account: 1,
                    amount: "100.00".to_string(),
                },
                ScenarioStep::Transfer {
                    from: 0,
                    to: 1,
                    amount: "200.00".to_string(),
                },
                ScenarioStep::AssertBalance {
                    account: 0,
                    amount: "900.00".to_string(),
                },
                ScenarioStep::AssertBalance {
                    account: 1,
                    amount: "300.00".to_string(),
                },
            ],
        }
    }

    /// Opposite-direction transfer storm between two accounts. Every pair
    /// nets to zero, so both balances end where they started. Assumes
    /// accounts seeded at 1000.00.
    fn contention() -> Self {
        Self {
            name: "contention".to_string(),
            description: "Opposite-direction transfer storm on one account pair".to_string(),
            steps: vec![
                ScenarioStep::TransferStorm {
                    a: 0,
                    b: 1,
                    rounds: 25,
                    amount: "10.00".to_string(),
                },
                ScenarioStep::AssertBalance {
                    account: 0,
                    amount: "1000.00".to_string(),
                },
                ScenarioStep::AssertBalance {
                    account: 1,
                    amount: "1000.00".to_string(),
                },
            ],
        }
    }
}
