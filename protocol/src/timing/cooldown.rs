//! Cancel/claim window arithmetic.
//!
//! Everything here is a pure function of `(created_at, expires_at, now)`
//! and the configured cooldown. Nothing is stored, nothing transitions on
//! its own; the ledger asks these questions when an operation arrives.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MAX_CANCEL_COOLDOWN;

/// Errors building a [`CooldownPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CooldownError {
    #[error("cancel cooldown must not be negative")]
    Negative,

    #[error("cancel cooldown of {secs}s exceeds the maximum of {max}s")]
    TooLong { secs: u64, max: u64 },
}

/// Where a pending transfer currently sits on its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferPhase {
    /// Only the sender may act (cancel).
    CancelWindow,
    /// Only the receiver may act (claim).
    ClaimWindow,
    /// Past expiration; anyone may trigger the refund. If expiration fell
    /// inside the cooldown the sender can still cancel until the cancel
    /// deadline, so `Expired` alone does not mean cancel is closed; check
    /// [`CooldownPolicy::cancel_window_open`].
    Expired,
}

/// The sender-exclusive cancellation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    cancel_cooldown: Duration,
}

impl CooldownPolicy {
    /// # Errors
    ///
    /// [`CooldownError::Negative`] or [`CooldownError::TooLong`].
    pub fn new(cancel_cooldown: Duration) -> Result<Self, CooldownError> {
        if cancel_cooldown < Duration::zero() {
            return Err(CooldownError::Negative);
        }
        let secs = cancel_cooldown.num_seconds() as u64;
        if secs > MAX_CANCEL_COOLDOWN.as_secs() {
            return Err(CooldownError::TooLong {
                secs,
                max: MAX_CANCEL_COOLDOWN.as_secs(),
            });
        }
        Ok(Self { cancel_cooldown })
    }

    /// Convenience constructor from whole seconds, the unit configs use.
    pub fn from_secs(secs: u64) -> Result<Self, CooldownError> {
        if secs > MAX_CANCEL_COOLDOWN.as_secs() {
            return Err(CooldownError::TooLong {
                secs,
                max: MAX_CANCEL_COOLDOWN.as_secs(),
            });
        }
        // Bounded above, so the cast and `seconds` cannot panic.
        Self::new(Duration::seconds(secs as i64))
    }

    /// Like [`from_secs`](Self::from_secs) but clamps to the maximum instead
    /// of failing. For cooldowns read back off stored records, which were
    /// validated when they were written.
    pub fn saturating_from_secs(secs: u64) -> Self {
        let secs = secs.min(MAX_CANCEL_COOLDOWN.as_secs());
        Self {
            cancel_cooldown: Duration::seconds(secs as i64),
        }
    }

    pub fn cancel_cooldown(&self) -> Duration {
        self.cancel_cooldown
    }

    pub fn cooldown_secs(&self) -> u64 {
        self.cancel_cooldown.num_seconds() as u64
    }

    /// Last instant at which the sender may still cancel.
    pub fn cancel_deadline(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at
            .checked_add_signed(self.cancel_cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// `now <= created_at + cooldown`.
    pub fn cancel_window_open(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now <= self.cancel_deadline(created_at)
    }

    /// `now > created_at + cooldown && now <= expires_at`.
    pub fn claim_window_open(
        &self,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        now > self.cancel_deadline(created_at) && now <= expires_at
    }

    /// `now > expires_at`, regardless of which window the expiration fell in.
    pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now > expires_at
    }

    /// Current phase. Expiration wins: a transfer whose expiration falls
    /// inside its own cooldown goes straight from `CancelWindow` to `Expired`.
    pub fn phase(
        &self,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> TransferPhase {
        if Self::is_expired(expires_at, now) {
            TransferPhase::Expired
        } else if self.cancel_window_open(created_at, now) {
            TransferPhase::CancelWindow
        } else {
            TransferPhase::ClaimWindow
        }
    }
}
