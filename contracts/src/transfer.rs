//! # Transfer Records
//!
//! A [`Transfer`] is one locked payment. Its lifecycle is:
//!
//! 1. **Create** — the sender locks `net_amount + fee_amount`; the record
//!    starts `Pending`.
//! 2. **Cancel** — during the cooldown the sender may take `net_amount`
//!    back. The fee stays spent.
//! 3. **Claim** — after the cooldown and up to expiration the receiver may
//!    take `net_amount` by presenting the password.
//! 4. **Reclaim** — past expiration, anyone may send `net_amount` back to
//!    the sender.
//!
//! Exactly one of steps 2–4 ever happens to a given transfer.

use std::fmt;

use chrono::{DateTime, Utc};
use passlock_protocol::asset::{AccountId, AssetId};
use passlock_protocol::crypto::PasswordCommitment;
use passlock_protocol::timing::{CooldownPolicy, TransferPhase};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Ledger-assigned sequence number. The first transfer is `1`; ids are
/// never reused. A create that fails consumes no id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub u64);

impl TransferId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for TransferId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Where a transfer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Funds are in escrow. The only non-terminal state.
    Pending,
    /// The receiver claimed the funds.
    Claimed,
    /// The sender canceled during the cooldown and got the funds back.
    Canceled,
    /// Nobody claimed in time; the funds went back to the sender.
    ExpiredAndRefunded,
}

impl TransferStatus {
    /// `true` for every state except `Pending`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Pending => write!(f, "Pending"),
            TransferStatus::Claimed => write!(f, "Claimed"),
            TransferStatus::Canceled => write!(f, "Canceled"),
            TransferStatus::ExpiredAndRefunded => write!(f, "ExpiredAndRefunded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

/// The stored record of one transfer.
///
/// Amounts, fee and cooldown are frozen at creation; changing the ledger's
/// configuration later never alters an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Sequence number assigned by the ledger.
    pub id: TransferId,
    /// Account that locked the funds.
    pub sender: AccountId,
    /// The only account allowed to claim.
    pub receiver: AccountId,
    /// What was locked.
    pub asset: AssetId,
    /// Amount released on settlement. Excludes the fee.
    pub net_amount: u64,
    /// Fee charged on top of `net_amount` at creation.
    pub fee_amount: u64,
    /// Salted commitment to the claim password.
    pub password: PasswordCommitment,
    /// When the ledger accepted the transfer.
    pub created_at: DateTime<Utc>,
    /// Claims are refused after this instant.
    pub expires_at: DateTime<Utc>,
    /// Length of the sender's cancel window, in seconds.
    pub cancel_cooldown_secs: u64,
    /// Current lifecycle state.
    pub status: TransferStatus,
    /// When the transfer reached its terminal state.
    pub settled_at: Option<DateTime<Utc>>,
}

impl Transfer {
    /// Total pulled from the sender at creation: `net_amount + fee_amount`.
    pub fn escrowed_total(&self) -> u64 {
        self.net_amount.saturating_add(self.fee_amount)
    }

    /// The cooldown this transfer was created under.
    pub fn cooldown(&self) -> CooldownPolicy {
        CooldownPolicy::saturating_from_secs(self.cancel_cooldown_secs)
    }

    /// Last instant the sender can cancel.
    pub fn cancel_deadline(&self) -> DateTime<Utc> {
        self.cooldown().cancel_deadline(self.created_at)
    }

    /// Timeline phase at `now`, or `None` once settled.
    pub fn phase_at(&self, now: DateTime<Utc>) -> Option<TransferPhase> {
        if self.status.is_terminal() {
            return None;
        }
        Some(self.cooldown().phase(self.created_at, self.expires_at, now))
    }

    /// `true` if `account` is the sender or the receiver.
    pub fn involves(&self, account: &AccountId) -> bool {
        &self.sender == account || &self.receiver == account
    }

    /// `true` while the transfer is pending and the sender may still cancel.
    /// Independent of [`Transfer::phase_at`]: an expiration inside the
    /// cooldown reports `Expired` with cancel still open.
    pub fn cancel_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TransferStatus::Pending
            && self.cooldown().cancel_window_open(self.created_at, now)
    }

    /// Display projection. Drops the password commitment.
    pub fn view(&self, now: DateTime<Utc>) -> TransferView {
        TransferView {
            id: self.id,
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            asset: self.asset.clone(),
            net_amount: self.net_amount,
            fee_amount: self.fee_amount,
            created_at: self.created_at,
            expires_at: self.expires_at,
            cancel_deadline: self.cancel_deadline(),
            status: self.status,
            phase: self.phase_at(now),
            cancel_open: self.cancel_open_at(now),
            settled_at: self.settled_at,
        }
    }

    /// Moves a pending transfer into `status`. Only the ledger calls this,
    /// and only after the funds have moved.
    pub(crate) fn settle(&mut self, status: TransferStatus, at: DateTime<Utc>) {
        debug_assert!(!self.status.is_terminal(), "settling a settled transfer");
        debug_assert!(status.is_terminal(), "settling into Pending");
        self.status = status;
        self.settled_at = Some(at);
    }
}

/// What read queries return: every field a front-end needs to render a
/// transfer and its timers, and nothing that helps guess the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferView {
    pub id: TransferId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub asset: AssetId,
    pub net_amount: u64,
    pub fee_amount: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// End of the sender's cancel window; claims open right after it.
    pub cancel_deadline: DateTime<Utc>,
    pub status: TransferStatus,
    /// `None` once the transfer is settled.
    pub phase: Option<TransferPhase>,
    /// Whether a cancel by the sender would be accepted right now.
    pub cancel_open: bool,
    pub settled_at: Option<DateTime<Utc>>,
}
