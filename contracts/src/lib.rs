// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Passlock Transfer Ledger
//!
//! The engine behind Passlock: a sender locks funds for a receiver behind a
//! password, keeps an exclusive right to change their mind for a while, and
//! after that the receiver (and only the receiver, and only with the
//! password) can take the money.
//!
//! - **Transfer** — the record: who, what, how much, when, and which of the
//!   four states it is in.
//! - **Transfer Ledger** — the state machine that creates, cancels, claims
//!   and refunds transfers, moving funds through an
//!   [`AssetMover`](passlock_protocol::asset::AssetMover) as it goes.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow — we use `checked_add`
//!    everywhere, because wrapping arithmetic and money do not mix.
//! 2. State transitions are explicit: enum variants, not boolean flags.
//!    `Pending` is the only state that goes anywhere.
//! 3. No funds move unless the transition commits, and no transition
//!    commits unless the funds moved.
//! 4. Every public type is serializable (serde) for wire transport and
//!    persistent storage. The password commitment never leaves through a
//!    read query.

pub mod transfer;
pub mod transfer_ledger;

pub use transfer::{Transfer, TransferId, TransferStatus, TransferView};
pub use transfer_ledger::{ErrorKind, LedgerConfig, LedgerError, LedgerStats, TransferLedger};
