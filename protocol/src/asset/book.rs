//! # In-Memory Balance Book
//!
//! A [`BalanceBook`] is the simplest possible [`AssetMover`]: a map from
//! `(account, asset)` to a `u64`, behind a lock. The devnet node runs on it
//! and every ledger test uses it to check that money is conserved.
//!
//! Each debit/credit takes the write lock for its whole read-check-write,
//! so a single call is atomic. Zero balances are kept (rather than pruned)
//! so that an account that has been emptied still shows up in snapshots.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::id::{AccountId, AssetId};
use super::mover::{AssetError, AssetMover};

/// Thread-safe in-memory balances. Share it via `Arc<BalanceBook>`.
#[derive(Debug, Default)]
pub struct BalanceBook {
    balances: RwLock<HashMap<(AccountId, AssetId), u64>>,
}

impl BalanceBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from a snapshot produced by [`entries`](Self::entries).
    pub fn from_entries(entries: impl IntoIterator<Item = (AccountId, AssetId, u64)>) -> Self {
        let balances = entries
            .into_iter()
            .map(|(account, asset, amount)| ((account, asset), amount))
            .collect();
        Self {
            balances: RwLock::new(balances),
        }
    }

    /// Mints `amount` into an account out of thin air. Devnet faucet and
    /// test setup only — the ledger never calls this.
    ///
    /// Returns the new balance.
    pub fn deposit(
        &self,
        account: &AccountId,
        asset: &AssetId,
        amount: u64,
    ) -> Result<u64, AssetError> {
        self.apply_credit(account, asset, amount)
    }

    /// Current balance, zero for accounts never seen.
    pub fn balance_of(&self, account: &AccountId, asset: &AssetId) -> u64 {
        self.balances
            .read()
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all balances of one asset. Used by conservation checks: the
    /// total across accounts plus whatever sits in escrow must never change
    /// except through deposits.
    pub fn total_of(&self, asset: &AssetId) -> u128 {
        self.balances
            .read()
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, amount)| *amount as u128)
            .sum()
    }

    /// Snapshot of every balance entry, sorted for stable output.
    pub fn entries(&self) -> Vec<(AccountId, AssetId, u64)> {
        let mut out: Vec<_> = self
            .balances
            .read()
            .iter()
            .map(|((account, asset), amount)| (account.clone(), asset.clone(), *amount))
            .collect();
        out.sort();
        out
    }

    fn apply_credit(
        &self,
        account: &AccountId,
        asset: &AssetId,
        amount: u64,
    ) -> Result<u64, AssetError> {
        let mut balances = self.balances.write();
        let balance = balances
            .entry((account.clone(), asset.clone()))
            .or_insert(0);

        let updated = balance.checked_add(amount).ok_or_else(|| AssetError::Overflow {
            account: account.clone(),
            asset: asset.clone(),
            current: *balance,
            credit: amount,
        })?;

        *balance = updated;
        Ok(updated)
    }
}

impl AssetMover for BalanceBook {
    fn debit(&self, account: &AccountId, asset: &AssetId, amount: u64) -> Result<(), AssetError> {
        let mut balances = self.balances.write();
        let key = (account.clone(), asset.clone());
        let available = balances.get(&key).copied().unwrap_or(0);

        if available < amount {
            return Err(AssetError::InsufficientBalance {
                account: account.clone(),
                asset: asset.clone(),
                available,
                requested: amount,
            });
        }

        balances.insert(key, available - amount);
        Ok(())
    }

    fn credit(
        &self,
        account: &AccountId,
        asset: &AssetId,
        amount: u64,
    ) -> Result<(), AssetError> {
        self.apply_credit(account, asset, amount).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
