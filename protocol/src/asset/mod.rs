//! # Asset Module — Identifiers, Movement, Balances
//!
//! The ledger decides *whether* money moves. This module describes *what*
//! moves (`AssetId`), *whose* it is (`AccountId`), and the seam through
//! which it actually moves ([`AssetMover`]).
//!
//! ## Architecture
//!
//! ```text
//! id.rs     — AccountId and AssetId (native sentinel or token address)
//! mover.rs  — The AssetMover trait and its error type
//! book.rs   — BalanceBook: in-memory AssetMover for devnet and tests
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are `u64` in smallest-unit denomination.** Token
//!    decimals are a display concern and are out of scope here.
//! 2. **Movement is atomic per call.** A debit either takes the whole
//!    amount or nothing; same for credits.
//! 3. **The ledger owns no balances.** Escrowed funds are whatever the
//!    mover debited and has not yet credited back out.

pub mod book;
pub mod id;
pub mod mover;

pub use book::BalanceBook;
pub use id::{AccountId, AssetId};
pub use mover::{AssetError, AssetMover};
