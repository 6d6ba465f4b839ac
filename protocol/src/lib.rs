// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Passlock Protocol — Core Primitives
//!
//! Passlock moves money through a password-gated escrow: a sender locks an
//! amount for a receiver, the sender keeps an exclusive window to change
//! their mind, and after that the receiver can pull the funds by presenting
//! the password. If nobody claims in time, anyone can sweep the funds back
//! to the sender.
//!
//! This crate holds the pieces that have no state of their own. The ledger
//! that strings them together lives in `passlock-contracts`.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants and defaults. One place for the magic numbers.
//! - **crypto** — BLAKE3 hashing and salted password commitments.
//! - **asset** — Account/asset identifiers and the [`asset::AssetMover`] seam.
//! - **fee** — The tiered fee schedule, shared by charging and quoting.
//! - **timing** — Cooldown/claim windows and the clock abstraction.
//! - **storage** — sled-backed persistence for transfer records and balances.
//!
//! ## Design Philosophy
//!
//! 1. All amounts are `u64` in the asset's smallest unit. No floats, ever.
//! 2. Pure functions where possible. Fees and windows are computed, not stored.
//! 3. If it touches money, it has tests. Plural.

pub mod asset;
pub mod config;
pub mod crypto;
pub mod fee;
pub mod storage;
pub mod timing;
