//! The [`AssetMover`] seam.
//!
//! The ledger never touches balances directly. It asks a mover to pull
//! funds from the sender at creation and to push them to exactly one
//! destination at settlement. Whatever sits behind the trait (an in-memory
//! book, a database, a token contract) must make each call atomic: either
//! the whole amount moves or nothing does, and the caller learns which
//! before the call returns.

use thiserror::Error;

use super::id::{AccountId, AssetId};

/// Errors reported by an [`AssetMover`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// The account does not hold enough of the asset.
    #[error("insufficient balance: {account} holds {available} {asset}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        available: u64,
        requested: u64,
    },

    /// Crediting would overflow the account's balance.
    ///
    /// If you're hitting this, someone is trying to credit more than
    /// 18.4 quintillion units. That's either a bug or an attack.
    #[error("balance overflow: {account} holds {current} {asset}, credit {credit}")]
    Overflow {
        account: AccountId,
        asset: AssetId,
        current: u64,
        credit: u64,
    },

    /// The backing store refused or could not be reached.
    #[error("asset backend unavailable: {0}")]
    Unavailable(String),
}

/// Moves balances on behalf of the ledger.
///
/// Both methods are synchronous and all-or-nothing.
pub trait AssetMover: Send + Sync {
    /// Takes `amount` of `asset` from `account`.
    fn debit(&self, account: &AccountId, asset: &AssetId, amount: u64) -> Result<(), AssetError>;

    /// Gives `amount` of `asset` to `account`.
    fn credit(&self, account: &AccountId, asset: &AssetId, amount: u64)
        -> Result<(), AssetError>;
}
