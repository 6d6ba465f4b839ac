//! # Storage Module
//!
//! Persistent storage for a Passlock node. The ledger itself lives in
//! memory; this module is how it survives a restart.
//!
//! ```text
//! db.rs — sled persistence: transfer records, balances, metadata
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Write-through, not write-ahead.** The node persists the touched
//!    record after every committed ledger operation. On start it loads
//!    every record and hands them to the ledger's restore path.
//!
//! 2. **Bincode for on-disk serialization.** Compact, fast, deterministic.
//!    JSON is for APIs and debugging; bincode is for storage.

pub mod db;

pub use db::{DbError, DbResult, LedgerDb};
