//! # Transfer Ledger
//!
//! The state machine. Owns every [`Transfer`], is the only thing that ever
//! writes a status, and talks to the outside world through exactly two
//! seams: an [`AssetMover`] for money and a [`Clock`] for time.
//!
//! ## Operations
//!
//! | Operation          | Who         | When                              | Funds go to |
//! |--------------------|-------------|-----------------------------------|-------------|
//! | `create`           | sender      | any time                          | escrow      |
//! | `cancel`           | sender      | `now <= created_at + cooldown`    | sender      |
//! | `claim`            | receiver    | cooldown < `now` <= `expires_at`  | receiver    |
//! | `reclaim_expired`  | anyone      | `now > expires_at`                | sender      |
//!
//! ## Concurrency
//!
//! Records live in a [`DashMap`]. Every transition holds its transfer's
//! entry lock from the first precondition check until the status write, and
//! the asset movement happens inside that window. Two claims on the same id,
//! or a claim racing a cancel, serialize: the loser sees `NotPending`.
//! Transfers in different shards proceed in parallel.
//!
//! Because the lock is held across [`AssetMover`] calls, a mover must never
//! call back into the ledger.
//!
//! ## Failure Semantics
//!
//! All-or-nothing. Preconditions are checked before anything moves; if the
//! asset movement fails, the record is left exactly as it was. A failed
//! `create` leaves no record and consumes no id.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use passlock_protocol::asset::{AccountId, AssetError, AssetId, AssetMover};
use passlock_protocol::config::{DEFAULT_CANCEL_COOLDOWN, DEFAULT_MIN_PASSWORD_LENGTH};
use passlock_protocol::crypto::{Blake3Commitment, CommitmentScheme};
use passlock_protocol::fee::{FeeError, FeeQuote, FeeSchedule};
use passlock_protocol::timing::{Clock, CooldownError, CooldownPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::transfer::{Transfer, TransferId, TransferStatus, TransferView};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Every way a ledger operation can be refused.
///
/// Each variant maps to one [`ErrorKind`], so a front-end can tell "too
/// early to claim" from "wrong password" without parsing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("transfer {0} not found")]
    NotFound(TransferId),

    #[error("{caller} is not the sender of transfer {id}")]
    NotSender { id: TransferId, caller: AccountId },

    #[error("{caller} is not the receiver of transfer {id}")]
    NotReceiver { id: TransferId, caller: AccountId },

    #[error("transfer {id} is {status}, not Pending")]
    NotPending { id: TransferId, status: TransferStatus },

    #[error("cancel window for transfer {id} closed at {deadline}")]
    CooldownElapsed {
        id: TransferId,
        deadline: DateTime<Utc>,
    },

    /// The sender can still cancel; claims open strictly after `opens_after`.
    #[error("transfer {id} cannot be claimed until after {opens_after}")]
    ClaimNotYetOpen {
        id: TransferId,
        opens_after: DateTime<Utc>,
    },

    #[error("transfer {id} expired at {expired_at}")]
    TransferExpired {
        id: TransferId,
        expired_at: DateTime<Utc>,
    },

    #[error("transfer {id} does not expire until {expires_at}")]
    NotYetExpired {
        id: TransferId,
        expires_at: DateTime<Utc>,
    },

    #[error("incorrect password for transfer {0}")]
    IncorrectPassword(TransferId),

    #[error("a password is required")]
    PasswordMissing,

    #[error("password must be at least {min} characters, got {actual}")]
    PasswordTooShort { min: usize, actual: usize },

    #[error("amount must be greater than zero")]
    AmountTooLow,

    #[error("sender and receiver must differ")]
    SelfTransferNotAllowed,

    #[error("expiration {expires_at} is not after the current time {now}")]
    InvalidExpiration {
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("invalid fee configuration: {0}")]
    InvalidFeeConfiguration(FeeError),

    #[error("invalid cooldown configuration: {0}")]
    InvalidCooldownConfiguration(#[from] CooldownError),

    /// `amount + fee` does not fit in a `u64`.
    #[error("amount {amount} plus fee overflows")]
    AmountOverflow { amount: u64 },

    #[error("asset movement failed: {0}")]
    AssetMovementFailed(#[from] AssetError),

    /// A record handed to [`TransferLedger::restore`] is unusable.
    #[error("invalid stored transfer {id}: {reason}")]
    InvalidRecord { id: TransferId, reason: String },
}

impl From<FeeError> for LedgerError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::Overflow { amount, .. } => LedgerError::AmountOverflow { amount },
            other => LedgerError::InvalidFeeConfiguration(other),
        }
    }
}

/// Stable, payload-free name for a [`LedgerError`]. Transports put this in
/// their error bodies; it never changes when a message is reworded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    NotSender,
    NotReceiver,
    NotPending,
    CooldownElapsed,
    ClaimNotYetOpen,
    TransferExpired,
    NotYetExpired,
    IncorrectPassword,
    PasswordMissing,
    PasswordTooShort,
    AmountTooLow,
    SelfTransferNotAllowed,
    InvalidExpiration,
    InvalidFeeConfiguration,
    InvalidCooldownConfiguration,
    AmountOverflow,
    AssetMovementFailed,
    InvalidRecord,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NotSender => "NotSender",
            ErrorKind::NotReceiver => "NotReceiver",
            ErrorKind::NotPending => "NotPending",
            ErrorKind::CooldownElapsed => "CooldownElapsed",
            ErrorKind::ClaimNotYetOpen => "ClaimNotYetOpen",
            ErrorKind::TransferExpired => "TransferExpired",
            ErrorKind::NotYetExpired => "NotYetExpired",
            ErrorKind::IncorrectPassword => "IncorrectPassword",
            ErrorKind::PasswordMissing => "PasswordMissing",
            ErrorKind::PasswordTooShort => "PasswordTooShort",
            ErrorKind::AmountTooLow => "AmountTooLow",
            ErrorKind::SelfTransferNotAllowed => "SelfTransferNotAllowed",
            ErrorKind::InvalidExpiration => "InvalidExpiration",
            ErrorKind::InvalidFeeConfiguration => "InvalidFeeConfiguration",
            ErrorKind::InvalidCooldownConfiguration => "InvalidCooldownConfiguration",
            ErrorKind::AmountOverflow => "AmountOverflow",
            ErrorKind::AssetMovementFailed => "AssetMovementFailed",
            ErrorKind::InvalidRecord => "InvalidRecord",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::NotSender { .. } => ErrorKind::NotSender,
            LedgerError::NotReceiver { .. } => ErrorKind::NotReceiver,
            LedgerError::NotPending { .. } => ErrorKind::NotPending,
            LedgerError::CooldownElapsed { .. } => ErrorKind::CooldownElapsed,
            LedgerError::ClaimNotYetOpen { .. } => ErrorKind::ClaimNotYetOpen,
            LedgerError::TransferExpired { .. } => ErrorKind::TransferExpired,
            LedgerError::NotYetExpired { .. } => ErrorKind::NotYetExpired,
            LedgerError::IncorrectPassword(_) => ErrorKind::IncorrectPassword,
            LedgerError::PasswordMissing => ErrorKind::PasswordMissing,
            LedgerError::PasswordTooShort { .. } => ErrorKind::PasswordTooShort,
            LedgerError::AmountTooLow => ErrorKind::AmountTooLow,
            LedgerError::SelfTransferNotAllowed => ErrorKind::SelfTransferNotAllowed,
            LedgerError::InvalidExpiration { .. } => ErrorKind::InvalidExpiration,
            LedgerError::InvalidFeeConfiguration(_) => ErrorKind::InvalidFeeConfiguration,
            LedgerError::InvalidCooldownConfiguration(_) => {
                ErrorKind::InvalidCooldownConfiguration
            }
            LedgerError::AmountOverflow { .. } => ErrorKind::AmountOverflow,
            LedgerError::AssetMovementFailed(_) => ErrorKind::AssetMovementFailed,
            LedgerError::InvalidRecord { .. } => ErrorKind::InvalidRecord,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything tunable about a ledger. Fixed for the ledger's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Fee tiers applied at creation.
    pub fees: FeeSchedule,
    /// Sender-exclusive cancel window, in seconds.
    pub cancel_cooldown_secs: u64,
    /// Minimum claim password length, in characters.
    pub min_password_length: usize,
    /// Where collected fees are credited. With no treasury, fees simply
    /// stay with whoever operates the mover.
    pub treasury: Option<AccountId>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            cancel_cooldown_secs: DEFAULT_CANCEL_COOLDOWN.as_secs(),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            treasury: None,
        }
    }
}

impl LedgerConfig {
    /// Validates the config and returns the cooldown it describes.
    pub fn validate(&self) -> Result<CooldownPolicy, LedgerError> {
        self.fees
            .validate()
            .map_err(LedgerError::InvalidFeeConfiguration)?;
        Ok(CooldownPolicy::from_secs(self.cancel_cooldown_secs)?)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Point-in-time counters, for `/status` and metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total: usize,
    pub pending: usize,
    pub claimed: usize,
    pub canceled: usize,
    pub expired_and_refunded: usize,
    /// Net amounts currently held in escrow, per asset.
    pub escrowed: BTreeMap<AssetId, u64>,
    /// Fees charged since genesis, per asset.
    pub fees_collected: BTreeMap<AssetId, u64>,
}

// ---------------------------------------------------------------------------
// TransferLedger
// ---------------------------------------------------------------------------

/// The password-gated escrow engine.
///
/// Every method takes `&self`; share the ledger via `Arc<TransferLedger>`.
pub struct TransferLedger {
    config: LedgerConfig,
    cooldown: CooldownPolicy,
    transfers: DashMap<TransferId, Transfer>,
    next_id: AtomicU64,
    fees_collected: DashMap<AssetId, u64>,
    mover: Arc<dyn AssetMover>,
    clock: Arc<dyn Clock>,
    commitments: Box<dyn CommitmentScheme>,
}

impl fmt::Debug for TransferLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferLedger")
            .field("config", &self.config)
            .field("transfers", &self.transfers.len())
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl TransferLedger {
    /// Creates an empty ledger.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidFeeConfiguration`] or
    /// [`LedgerError::InvalidCooldownConfiguration`].
    pub fn new(
        config: LedgerConfig,
        mover: Arc<dyn AssetMover>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let cooldown = config.validate()?;
        Ok(Self {
            config,
            cooldown,
            transfers: DashMap::new(),
            next_id: AtomicU64::new(1),
            fees_collected: DashMap::new(),
            mover,
            clock,
            commitments: Box::new(Blake3Commitment),
        })
    }

    /// Rebuilds a ledger from persisted records.
    ///
    /// `next_id` is the counter saved alongside them; the ledger never goes
    /// below `max(id) + 1` whatever it says. Fee totals are recomputed from
    /// the records.
    pub fn restore(
        config: LedgerConfig,
        mover: Arc<dyn AssetMover>,
        clock: Arc<dyn Clock>,
        records: impl IntoIterator<Item = Transfer>,
        next_id: Option<u64>,
    ) -> Result<Self, LedgerError> {
        let ledger = Self::new(config, mover, clock)?;
        let mut highest = 0u64;

        for record in records {
            let id = record.id;
            if id.0 == 0 {
                return Err(LedgerError::InvalidRecord {
                    id,
                    reason: "id 0 is never assigned".into(),
                });
            }
            if record.net_amount.checked_add(record.fee_amount).is_none() {
                return Err(LedgerError::InvalidRecord {
                    id,
                    reason: "escrowed total overflows".into(),
                });
            }
            if record.expires_at <= record.created_at {
                return Err(LedgerError::InvalidRecord {
                    id,
                    reason: "expires_at is not after created_at".into(),
                });
            }
            if let Err(e) = CooldownPolicy::from_secs(record.cancel_cooldown_secs) {
                return Err(LedgerError::InvalidRecord {
                    id,
                    reason: e.to_string(),
                });
            }
            if record.status.is_terminal() != record.settled_at.is_some() {
                return Err(LedgerError::InvalidRecord {
                    id,
                    reason: format!("status {} disagrees with settled_at", record.status),
                });
            }

            ledger.add_fee(&record.asset, record.fee_amount);
            highest = highest.max(id.0);
            if ledger.transfers.insert(id, record).is_some() {
                return Err(LedgerError::InvalidRecord {
                    id,
                    reason: "duplicate id".into(),
                });
            }
        }

        let next = next_id.unwrap_or(1).max(highest.saturating_add(1));
        ledger.next_id.store(next, Ordering::SeqCst);

        info!(
            transfers = ledger.transfers.len(),
            next_id = next,
            "ledger restored"
        );
        Ok(ledger)
    }

    /// Swaps the password commitment scheme. Only affects transfers created
    /// afterwards, so call it before the ledger sees traffic.
    pub fn with_commitment_scheme(mut self, scheme: impl CommitmentScheme + 'static) -> Self {
        self.commitments = Box::new(scheme);
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn cooldown(&self) -> CooldownPolicy {
        self.cooldown
    }

    /// The id the next successful `create` will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// The ledger's idea of "now".
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -- Transitions --------------------------------------------------------

    /// Locks `amount` of `asset` for `receiver` behind `password`.
    ///
    /// Pulls `amount + fee` from the sender. On success the transfer is
    /// `Pending` and its id is returned.
    ///
    /// # Errors
    ///
    /// Checked in order: [`SelfTransferNotAllowed`](LedgerError::SelfTransferNotAllowed),
    /// [`AmountTooLow`](LedgerError::AmountTooLow),
    /// [`PasswordMissing`](LedgerError::PasswordMissing),
    /// [`PasswordTooShort`](LedgerError::PasswordTooShort),
    /// [`InvalidExpiration`](LedgerError::InvalidExpiration), then fee
    /// errors, then [`AssetMovementFailed`](LedgerError::AssetMovementFailed).
    pub fn create(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        asset: &AssetId,
        amount: u64,
        password: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<TransferId, LedgerError> {
        let now = self.clock.now();

        if let Err(err) = self.check_create(sender, receiver, amount, password, expires_at, now) {
            debug!(%sender, %receiver, kind = %err.kind(), "create rejected");
            return Err(err);
        }

        let fee = self.config.fees.compute_fee(amount)?;
        let total = amount
            .checked_add(fee)
            .ok_or(LedgerError::AmountOverflow { amount })?;
        let password = self.commitments.commit(password);

        self.mover.debit(sender, asset, total).map_err(|e| {
            warn!(%sender, %asset, total, error = %e, "create: debit failed");
            LedgerError::AssetMovementFailed(e)
        })?;

        if let Some(treasury) = self.config.treasury.as_ref().filter(|_| fee > 0) {
            if let Err(e) = self.mover.credit(treasury, asset, fee) {
                warn!(%treasury, %asset, fee, error = %e, "create: fee credit failed, refunding sender");
                if let Err(refund) = self.mover.credit(sender, asset, total) {
                    error!(%sender, %asset, total, error = %refund, "create: refund after failed fee credit also failed");
                }
                return Err(LedgerError::AssetMovementFailed(e));
            }
        }

        let id = TransferId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let transfer = Transfer {
            id,
            sender: sender.clone(),
            receiver: receiver.clone(),
            asset: asset.clone(),
            net_amount: amount,
            fee_amount: fee,
            password,
            created_at: now,
            expires_at,
            cancel_cooldown_secs: self.cooldown.cooldown_secs(),
            status: TransferStatus::Pending,
            settled_at: None,
        };
        self.transfers.insert(id, transfer);
        self.add_fee(asset, fee);

        info!(transfer = %id, %sender, %receiver, %asset, amount, fee, %expires_at, "transfer created");
        Ok(id)
    }

    /// Sender takes `net_amount` back during the cooldown. The fee is not
    /// refunded.
    pub fn cancel(&self, id: TransferId, caller: &AccountId) -> Result<(), LedgerError> {
        let mut transfer = self
            .transfers
            .get_mut(&id)
            .ok_or(LedgerError::NotFound(id))?;
        let now = self.clock.now();

        let checked = if &transfer.sender != caller {
            Err(LedgerError::NotSender {
                id,
                caller: caller.clone(),
            })
        } else if transfer.status != TransferStatus::Pending {
            Err(not_pending(&transfer))
        } else if !transfer
            .cooldown()
            .cancel_window_open(transfer.created_at, now)
        {
            Err(LedgerError::CooldownElapsed {
                id,
                deadline: transfer.cancel_deadline(),
            })
        } else {
            Ok(())
        };
        if let Err(err) = checked {
            debug!(transfer = %id, %caller, kind = %err.kind(), "cancel rejected");
            return Err(err);
        }

        let sender = transfer.sender.clone();
        self.release(&mut transfer, &sender, TransferStatus::Canceled, now)
    }

    /// Receiver takes `net_amount` with the password, after the cooldown and
    /// no later than `expires_at`.
    ///
    /// A wrong password changes nothing; the receiver may try again.
    pub fn claim(
        &self,
        id: TransferId,
        caller: &AccountId,
        password: &str,
    ) -> Result<(), LedgerError> {
        let mut transfer = self
            .transfers
            .get_mut(&id)
            .ok_or(LedgerError::NotFound(id))?;
        let now = self.clock.now();
        let cooldown = transfer.cooldown();

        // Expiration is checked before the cooldown so that a transfer that
        // expired inside its own cancel window reports as expired.
        let checked = if &transfer.receiver != caller {
            Err(LedgerError::NotReceiver {
                id,
                caller: caller.clone(),
            })
        } else if transfer.status != TransferStatus::Pending {
            Err(not_pending(&transfer))
        } else if CooldownPolicy::is_expired(transfer.expires_at, now) {
            Err(LedgerError::TransferExpired {
                id,
                expired_at: transfer.expires_at,
            })
        } else if !cooldown.claim_window_open(transfer.created_at, transfer.expires_at, now) {
            Err(LedgerError::ClaimNotYetOpen {
                id,
                opens_after: transfer.cancel_deadline(),
            })
        } else if !self.commitments.verify(&transfer.password, password) {
            Err(LedgerError::IncorrectPassword(id))
        } else {
            Ok(())
        };
        if let Err(err) = checked {
            debug!(transfer = %id, %caller, kind = %err.kind(), "claim rejected");
            return Err(err);
        }

        let receiver = transfer.receiver.clone();
        self.release(&mut transfer, &receiver, TransferStatus::Claimed, now)
    }

    /// Refunds `net_amount` to the sender once the transfer has expired
    /// unclaimed. Anyone may call it; `caller` is only logged.
    pub fn reclaim_expired(&self, id: TransferId, caller: &AccountId) -> Result<(), LedgerError> {
        let mut transfer = self
            .transfers
            .get_mut(&id)
            .ok_or(LedgerError::NotFound(id))?;
        let now = self.clock.now();

        let checked = if transfer.status != TransferStatus::Pending {
            Err(not_pending(&transfer))
        } else if !CooldownPolicy::is_expired(transfer.expires_at, now) {
            Err(LedgerError::NotYetExpired {
                id,
                expires_at: transfer.expires_at,
            })
        } else {
            Ok(())
        };
        if let Err(err) = checked {
            debug!(transfer = %id, %caller, kind = %err.kind(), "reclaim rejected");
            return Err(err);
        }

        debug!(transfer = %id, %caller, "reclaiming expired transfer");
        let sender = transfer.sender.clone();
        self.release(
            &mut transfer,
            &sender,
            TransferStatus::ExpiredAndRefunded,
            now,
        )
    }

    // -- Queries ------------------------------------------------------------

    pub fn get_transfer(&self, id: TransferId) -> Result<TransferView, LedgerError> {
        let now = self.clock.now();
        self.transfers
            .get(&id)
            .map(|t| t.view(now))
            .ok_or(LedgerError::NotFound(id))
    }

    /// Pending transfers `account` sent or can claim, oldest first.
    pub fn list_pending_for(&self, account: &AccountId) -> Vec<TransferView> {
        self.views_where(|t| t.status == TransferStatus::Pending && t.involves(account))
    }

    /// Settled transfers `account` took part in, oldest first.
    pub fn list_history_for(&self, account: &AccountId) -> Vec<TransferView> {
        self.views_where(|t| t.status.is_terminal() && t.involves(account))
    }

    /// What creating a transfer of `amount` would cost, computed by the same
    /// code that charges it.
    pub fn quote_fee(&self, amount: u64) -> Result<FeeQuote, LedgerError> {
        Ok(self.config.fees.quote(amount)?)
    }

    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats::default();
        for entry in self.transfers.iter() {
            let t = entry.value();
            stats.total += 1;
            match t.status {
                TransferStatus::Pending => {
                    stats.pending += 1;
                    let held = stats.escrowed.entry(t.asset.clone()).or_insert(0);
                    *held = held.saturating_add(t.net_amount);
                }
                TransferStatus::Claimed => stats.claimed += 1,
                TransferStatus::Canceled => stats.canceled += 1,
                TransferStatus::ExpiredAndRefunded => stats.expired_and_refunded += 1,
            }
        }
        stats.fees_collected = self
            .fees_collected
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        stats
    }

    /// Full stored record, commitment included. For persistence, not display.
    pub fn record(&self, id: TransferId) -> Option<Transfer> {
        self.transfers.get(&id).map(|t| t.value().clone())
    }

    /// Every stored record, oldest first.
    pub fn records(&self) -> Vec<Transfer> {
        let mut out: Vec<Transfer> = self.transfers.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|t| t.id);
        out
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    // -- Internals ----------------------------------------------------------

    fn check_create(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        amount: u64,
        password: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if sender == receiver {
            return Err(LedgerError::SelfTransferNotAllowed);
        }
        if amount == 0 {
            return Err(LedgerError::AmountTooLow);
        }
        if password.is_empty() {
            return Err(LedgerError::PasswordMissing);
        }
        let length = password.chars().count();
        if length < self.config.min_password_length {
            return Err(LedgerError::PasswordTooShort {
                min: self.config.min_password_length,
                actual: length,
            });
        }
        if expires_at <= now {
            return Err(LedgerError::InvalidExpiration { expires_at, now });
        }
        Ok(())
    }

    /// Credits `net_amount` to `to`, then settles. Called with the entry
    /// lock held; on a failed credit the record is untouched.
    fn release(
        &self,
        transfer: &mut Transfer,
        to: &AccountId,
        status: TransferStatus,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let id = transfer.id;
        self.mover
            .credit(to, &transfer.asset, transfer.net_amount)
            .map_err(|e| {
                warn!(transfer = %id, %to, %status, error = %e, "release failed, transfer stays Pending");
                LedgerError::AssetMovementFailed(e)
            })?;

        transfer.settle(status, now);
        info!(transfer = %id, %to, amount = transfer.net_amount, %status, "transfer settled");
        Ok(())
    }

    fn views_where(&self, keep: impl Fn(&Transfer) -> bool) -> Vec<TransferView> {
        let now = self.clock.now();
        let mut out: Vec<TransferView> = self
            .transfers
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().view(now))
            .collect();
        out.sort_by_key(|v| v.id);
        out
    }

    fn add_fee(&self, asset: &AssetId, fee: u64) {
        let mut total = self.fees_collected.entry(asset.clone()).or_insert(0);
        *total = total.saturating_add(fee);
    }
}

fn not_pending(transfer: &Transfer) -> LedgerError {
    LedgerError::NotPending {
        id: transfer.id,
        status: transfer.status,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
