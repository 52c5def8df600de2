//! Transfer-attempt lifecycle state machine.

use tracing::debug;

use walletcore_common::{LedgerError, Result};

/// Phase of a single transfer attempt.
///
/// A rolled-back attempt feeds back into a fresh attempt (bounded by the
/// retry budget) or terminates in the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    /// Checking inputs and account existence; no locks taken.
    Validating,
    /// Acquiring row locks in canonical order.
    LockAcquiring,
    /// Applying balance changes and staging ledger entries.
    Applying,
    /// Executing the atomic commit.
    Committing,
    /// Attempt committed.
    Done,
    /// Attempt aborted; all touched state is as it was before.
    RolledBack,
}

impl AttemptPhase {
    /// Get valid next phases from the current phase.
    pub fn valid_transitions(&self) -> &[AttemptPhase] {
        match self {
            AttemptPhase::Validating => &[AttemptPhase::LockAcquiring, AttemptPhase::RolledBack],
            AttemptPhase::LockAcquiring => &[AttemptPhase::Applying, AttemptPhase::RolledBack],
            AttemptPhase::Applying => &[AttemptPhase::Committing, AttemptPhase::RolledBack],
            AttemptPhase::Committing => &[AttemptPhase::Done, AttemptPhase::RolledBack],
            AttemptPhase::Done => &[],
            AttemptPhase::RolledBack => &[],
        }
    }

    /// Check if transition to the given phase is valid.
    pub fn can_transition_to(&self, next: AttemptPhase) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Check if this is a final phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptPhase::Done | AttemptPhase::RolledBack)
    }
}

/// Tracks one attempt through its phases, rejecting illegal transitions.
#[derive(Debug)]
pub struct AttemptTracker {
    phase: AttemptPhase,
}

impl AttemptTracker {
    /// Start a fresh attempt in `Validating`.
    pub fn new() -> Self {
        Self {
            phase: AttemptPhase::Validating,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    /// Advance to the next phase.
    pub fn advance(&mut self, next: AttemptPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(LedgerError::Internal(format!(
                "invalid attempt transition from {:?} to {:?}",
                self.phase, next
            )));
        }
        debug!(from = ?self.phase, to = ?next, "attempt phase transition");
        self.phase = next;
        Ok(())
    }

    /// Mark the attempt rolled back, from any non-terminal phase.
    pub fn roll_back(&mut self) {
        if !self.phase.is_terminal() {
            debug!(from = ?self.phase, "attempt rolled back");
            self.phase = AttemptPhase::RolledBack;
        }
    }
}

impl Default for AttemptTracker {
    fn default() -> Self {
        Self::new()
    }
}
