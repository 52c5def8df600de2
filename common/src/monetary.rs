//! Monetary amount validation for the walletcore ledger.
//!
//! All balances and operation amounts are fixed-point decimals with exactly
//! two fractional digits. Operation amounts must fall within
//! `[0.01, 1_000_000.00]` and are rejected before any storage access.

use rust_decimal::Decimal;

/// The number of fractional digits carried by every amount and balance.
pub const AMOUNT_SCALE: u32 = 2;

/// Smallest accepted operation amount (0.01).
pub fn min_amount() -> Decimal {
    Decimal::new(1, AMOUNT_SCALE)
}

/// Largest accepted operation amount (1,000,000.00).
pub fn max_amount() -> Decimal {
    Decimal::new(100_000_000, AMOUNT_SCALE)
}

/// Why an amount was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountIssue {
    /// Zero or negative.
    NotPositive,
    /// Carries more than two fractional digits.
    TooPrecise,
    /// Below the minimum accepted amount.
    BelowMinimum,
    /// Above the maximum accepted amount.
    AboveMaximum,
}

impl AmountIssue {
    /// Human-readable reason, used in error messages.
    pub fn reason(&self) -> &'static str {
        match self {
            AmountIssue::NotPositive => "amount must be positive",
            AmountIssue::TooPrecise => "amount must have at most 2 fractional digits",
            AmountIssue::BelowMinimum => "amount must be at least 0.01",
            AmountIssue::AboveMaximum => "amount cannot exceed 1,000,000.00",
        }
    }
}

/// Check an operation amount against explicit bounds.
///
/// Returns the first issue found, or `None` for a well-formed amount.
pub fn check_amount_in(amount: Decimal, min: Decimal, max: Decimal) -> Option<AmountIssue> {
    if amount <= Decimal::ZERO {
        return Some(AmountIssue::NotPositive);
    }
    if amount != amount.round_dp(AMOUNT_SCALE) {
        return Some(AmountIssue::TooPrecise);
    }
    if amount < min {
        return Some(AmountIssue::BelowMinimum);
    }
    if amount > max {
        return Some(AmountIssue::AboveMaximum);
    }
    None
}

/// Check an operation amount against the ledger's default bounds.
pub fn check_amount(amount: Decimal) -> Option<AmountIssue> {
    check_amount_in(amount, min_amount(), max_amount())
}
