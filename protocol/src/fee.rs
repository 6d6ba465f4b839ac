//! # Tiered Fee Schedule
//!
//! Every transfer pays a fee on top of the amount it locks. The rate
//! depends on which tier the amount falls into:
//!
//! ```text
//! amount <= limit_one               -> rate_one
//! limit_one < amount <= limit_two   -> rate_two
//! amount > limit_two                -> rate_three
//!
//! fee = floor(amount * rate / scaling_factor)
//! ```
//!
//! Boundaries belong to the lower tier. The division truncates, always.
//! Quotes and charges go through the same [`compute_fee`], so a preview can
//! never disagree with the charged amount — not even by one unit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{
    DEFAULT_FEE_LIMIT_ONE, DEFAULT_FEE_LIMIT_TWO, DEFAULT_FEE_RATE_ONE, DEFAULT_FEE_RATE_THREE,
    DEFAULT_FEE_RATE_TWO, DEFAULT_FEE_SCALING_FACTOR,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while computing a fee.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    /// A zero scaling factor would divide by zero.
    #[error("invalid fee configuration: scaling factor is zero")]
    ZeroScalingFactor,

    /// Tier boundaries are out of order.
    #[error("invalid fee configuration: limit_one {limit_one} exceeds limit_two {limit_two}")]
    InvertedTiers { limit_one: u64, limit_two: u64 },

    /// The fee does not fit in a `u64` (only possible when a rate exceeds
    /// the scaling factor).
    #[error("fee overflow: amount {amount} at rate {rate}/{scaling_factor}")]
    Overflow {
        amount: u64,
        rate: u64,
        scaling_factor: u64,
    },
}

impl FeeError {
    /// `true` for errors caused by the schedule itself rather than the amount.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FeeError::ZeroScalingFactor | FeeError::InvertedTiers { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which tier an amount fell into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeTier {
    One,
    Two,
    Three,
}

/// A fee preview: what the sender will be charged for locking `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Amount the receiver would get.
    pub amount: u64,
    /// Fee on top of the amount.
    pub fee: u64,
    /// `amount + fee`, pulled from the sender at creation.
    pub total: u64,
    /// Tier that priced this amount.
    pub tier: FeeTier,
}

/// Tier boundaries, per-tier rates and the common denominator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub limit_one: u64,
    pub limit_two: u64,
    pub rate_one: u64,
    pub rate_two: u64,
    pub rate_three: u64,
    pub scaling_factor: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            limit_one: DEFAULT_FEE_LIMIT_ONE,
            limit_two: DEFAULT_FEE_LIMIT_TWO,
            rate_one: DEFAULT_FEE_RATE_ONE,
            rate_two: DEFAULT_FEE_RATE_TWO,
            rate_three: DEFAULT_FEE_RATE_THREE,
            scaling_factor: DEFAULT_FEE_SCALING_FACTOR,
        }
    }
}

impl FeeSchedule {
    /// Builds and validates a schedule.
    ///
    /// # Errors
    ///
    /// [`FeeError::ZeroScalingFactor`] or [`FeeError::InvertedTiers`].
    pub fn new(
        (limit_one, limit_two): (u64, u64),
        (rate_one, rate_two, rate_three): (u64, u64, u64),
        scaling_factor: u64,
    ) -> Result<Self, FeeError> {
        let schedule = Self {
            limit_one,
            limit_two,
            rate_one,
            rate_two,
            rate_three,
            scaling_factor,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Checks the schedule without computing anything. Deserialized
    /// schedules skip [`new`](Self::new), so call this after loading one.
    pub fn validate(&self) -> Result<(), FeeError> {
        if self.scaling_factor == 0 {
            return Err(FeeError::ZeroScalingFactor);
        }
        if self.limit_one > self.limit_two {
            return Err(FeeError::InvertedTiers {
                limit_one: self.limit_one,
                limit_two: self.limit_two,
            });
        }
        Ok(())
    }

    /// The tier `amount` falls into.
    pub fn tier_for(&self, amount: u64) -> FeeTier {
        if amount <= self.limit_one {
            FeeTier::One
        } else if amount <= self.limit_two {
            FeeTier::Two
        } else {
            FeeTier::Three
        }
    }

    /// The rate applied to a tier.
    pub fn rate_for(&self, tier: FeeTier) -> u64 {
        match tier {
            FeeTier::One => self.rate_one,
            FeeTier::Two => self.rate_two,
            FeeTier::Three => self.rate_three,
        }
    }

    /// Fee charged for locking `amount`.
    pub fn compute_fee(&self, amount: u64) -> Result<u64, FeeError> {
        compute_fee(
            amount,
            (self.limit_one, self.limit_two),
            (self.rate_one, self.rate_two, self.rate_three),
            self.scaling_factor,
        )
    }

    /// Fee plus totals, for previews before committing.
    ///
    /// # Errors
    ///
    /// Anything [`compute_fee`](Self::compute_fee) returns, plus
    /// [`FeeError::Overflow`] if `amount + fee` does not fit in a `u64`.
    pub fn quote(&self, amount: u64) -> Result<FeeQuote, FeeError> {
        let fee = self.compute_fee(amount)?;
        let tier = self.tier_for(amount);
        let total = amount.checked_add(fee).ok_or(FeeError::Overflow {
            amount,
            rate: self.rate_for(tier),
            scaling_factor: self.scaling_factor,
        })?;
        Ok(FeeQuote {
            amount,
            fee,
            total,
            tier,
        })
    }
}

/// `floor(amount * rate / scaling_factor)` with the tier's rate.
///
/// The product is computed in `u128`, so it cannot overflow. Only the
/// quotient can exceed `u64`, and only if a rate is larger than the scaling
/// factor.
///
/// # Example
///
/// ```
/// use passlock_protocol::fee::compute_fee;
///
/// // 50 units in tier one at 1%: 0.5 truncates to 0.
/// assert_eq!(compute_fee(50, (100, 1000), (100, 50, 25), 10_000), Ok(0));
/// ```
pub fn compute_fee(
    amount: u64,
    (limit_one, limit_two): (u64, u64),
    (rate_one, rate_two, rate_three): (u64, u64, u64),
    scaling_factor: u64,
) -> Result<u64, FeeError> {
    if scaling_factor == 0 {
        return Err(FeeError::ZeroScalingFactor);
    }

    let rate = if amount <= limit_one {
        rate_one
    } else if amount <= limit_two {
        rate_two
    } else {
        rate_three
    };

    let fee = (amount as u128 * rate as u128) / scaling_factor as u128;
    u64::try_from(fee).map_err(|_| FeeError::Overflow {
        amount,
        rate,
        scaling_factor,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
