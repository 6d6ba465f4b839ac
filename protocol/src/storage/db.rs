//! # LedgerDb — Persistent Storage
//!
//! The persistence layer for a Passlock node, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! | Tree        | Key                          | Value              |
//! |-------------|------------------------------|--------------------|
//! | `transfers` | `id` (8B BE)                 | `bincode(record)`  |
//! | `balances`  | `len(account)` (4B BE) `|| account || asset` | `amount` (8B BE) |
//! | `metadata`  | key (UTF-8)                  | value (bytes)      |
//!
//! Transfer ids are big-endian so that sled's lexicographic ordering
//! matches numeric ordering and a full scan returns records oldest first.
//!
//! Account and asset ids are arbitrary strings, NUL included, so balance
//! keys carry the account length instead of a separator.
//!
//! A settled operation touches all three trees; [`LedgerDb::commit_transfer`]
//! writes them in one sled transaction so a crash can't store a record
//! without the balances it moved.
//!
//! The record type is generic: this crate doesn't know what a transfer
//! looks like, only that it serializes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Batch, Db, Transactional, Tree};
use std::path::Path;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt entry in {tree}: {reason}")]
    Corrupt { tree: &'static str, reason: String },
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the next transfer id.
const META_NEXT_TRANSFER_ID: &[u8] = b"next_transfer_id";

/// Width of the account-length prefix in balance keys.
const ACCOUNT_LEN_BYTES: usize = 4;

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent storage for transfer records, balances and ledger metadata.
///
/// sled is thread-safe; share a `LedgerDb` via `Arc<LedgerDb>` without
/// extra locking.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    transfers: Tree,
    balances: Tree,
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Ideal for unit tests — no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let transfers = db.open_tree("transfers")?;
        let balances = db.open_tree("balances")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            transfers,
            balances,
            metadata,
        })
    }

    // -- Transfer records ---------------------------------------------------

    /// Insert or overwrite the record for `id`.
    pub fn put_transfer<T: Serialize>(&self, id: u64, record: &T) -> DbResult<()> {
        let bytes =
            bincode::serialize(record).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.transfers.insert(id.to_be_bytes(), bytes)?;
        Ok(())
    }

    /// Retrieve the record for `id`, or `None` if it was never stored.
    pub fn get_transfer<T: DeserializeOwned>(&self, id: u64) -> DbResult<Option<T>> {
        match self.transfers.get(id.to_be_bytes())? {
            Some(bytes) => {
                let record =
                    bincode::deserialize(&bytes).map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Every stored record in ascending id order.
    pub fn load_transfers<T: DeserializeOwned>(&self) -> DbResult<Vec<T>> {
        self.transfers
            .iter()
            .values()
            .map(|value| {
                let bytes = value?;
                bincode::deserialize(&bytes).map_err(|e| DbError::Serialization(e.to_string()))
            })
            .collect()
    }

    /// Stores a record, the id counter and the balances it moved as one
    /// atomic unit. Either all of them are on disk afterwards or none are.
    pub fn commit_transfer<'a, T, I>(
        &self,
        id: u64,
        record: &T,
        next_id: u64,
        balances: I,
    ) -> DbResult<()>
    where
        T: Serialize,
        I: IntoIterator<Item = (&'a str, &'a str, u64)>,
    {
        let record_bytes =
            bincode::serialize(record).map_err(|e| DbError::Serialization(e.to_string()))?;
        let id_key = id.to_be_bytes();
        let next_id_bytes = next_id.to_be_bytes();
        let balance_entries: Vec<(Vec<u8>, [u8; 8])> = balances
            .into_iter()
            .map(|(account, asset, amount)| Ok((balance_key(account, asset)?, amount.to_be_bytes())))
            .collect::<DbResult<_>>()?;

        (&self.transfers, &self.balances, &self.metadata)
            .transaction(|(transfers, balances, metadata)| {
                transfers.insert(&id_key[..], record_bytes.as_slice())?;
                metadata.insert(META_NEXT_TRANSFER_ID, &next_id_bytes[..])?;
                for (key, amount) in &balance_entries {
                    balances.insert(key.as_slice(), &amount[..])?;
                }
                Ok::<(), ConflictableTransactionError<DbError>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => DbError::Sled(e),
            })
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }

    // -- Balances -----------------------------------------------------------

    /// Write a batch of `(account, asset, amount)` balances atomically.
    pub fn put_balances<'a, I>(&self, entries: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str, u64)>,
    {
        let mut batch = Batch::default();
        for (account, asset, amount) in entries {
            batch.insert(balance_key(account, asset)?, &amount.to_be_bytes());
        }
        self.balances.apply_batch(batch)?;
        Ok(())
    }

    /// Every stored balance as `(account, asset, amount)`.
    pub fn load_balances(&self) -> DbResult<Vec<(String, String, u64)>> {
        self.balances
            .iter()
            .map(|entry| {
                let (key, value) = entry?;
                let (account, asset) = split_balance_key(&key)?;
                let amount = u64::from_be_bytes(value.as_ref().try_into().map_err(|_| {
                    DbError::Corrupt {
                        tree: "balances",
                        reason: format!("amount for {}/{} is not 8 bytes", account, asset),
                    }
                })?);
                Ok((account, asset, amount))
            })
            .collect()
    }

    // -- Metadata -----------------------------------------------------------

    /// The next transfer id recorded by the ledger, if any.
    pub fn next_transfer_id(&self) -> DbResult<Option<u64>> {
        match self.metadata.get(META_NEXT_TRANSFER_ID)? {
            Some(bytes) => {
                let id = u64::from_be_bytes(bytes.as_ref().try_into().map_err(|_| {
                    DbError::Corrupt {
                        tree: "metadata",
                        reason: "next_transfer_id is not 8 bytes".to_string(),
                    }
                })?);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    pub fn set_next_transfer_id(&self, id: u64) -> DbResult<()> {
        self.metadata.insert(META_NEXT_TRANSFER_ID, &id.to_be_bytes())?;
        Ok(())
    }

    // -- Utility ------------------------------------------------------------

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn balance_key(account: &str, asset: &str) -> DbResult<Vec<u8>> {
    let len = u32::try_from(account.len()).map_err(|_| {
        DbError::Serialization(format!("account id of {} bytes is too long", account.len()))
    })?;
    let mut key = Vec::with_capacity(ACCOUNT_LEN_BYTES + account.len() + asset.len());
    key.extend_from_slice(&len.to_be_bytes());
    key.extend_from_slice(account.as_bytes());
    key.extend_from_slice(asset.as_bytes());
    Ok(key)
}

fn split_balance_key(key: &[u8]) -> DbResult<(String, String)> {
    let corrupt = |reason: &str| DbError::Corrupt {
        tree: "balances",
        reason: reason.to_string(),
    };
    if key.len() < ACCOUNT_LEN_BYTES {
        return Err(corrupt("key shorter than its length prefix"));
    }
    let (prefix, rest) = key.split_at(ACCOUNT_LEN_BYTES);
    let mut len_bytes = [0u8; ACCOUNT_LEN_BYTES];
    len_bytes.copy_from_slice(prefix);
    let len = u32::from_be_bytes(len_bytes) as usize;
    if rest.len() < len {
        return Err(corrupt("account length runs past the key"));
    }
    let (account, asset) = rest.split_at(len);
    let account = std::str::from_utf8(account).map_err(|_| corrupt("account is not UTF-8"))?;
    let asset = std::str::from_utf8(asset).map_err(|_| corrupt("asset is not UTF-8"))?;
    Ok((account.to_string(), asset.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        note: String,
    }

    fn record(id: u64) -> Record {
        Record {
            id,
            note: format!("transfer #{id}"),
        }
    }

    #[test]
    fn open_temporary_database() {
        let db = LedgerDb::open_temporary().expect("should create temp db");
        assert_eq!(db.transfer_count(), 0);
        assert_eq!(db.next_transfer_id().unwrap(), None);
    }

    #[test]
    fn store_and_retrieve_transfer() {
        let db = LedgerDb::open_temporary().unwrap();
        db.put_transfer(7, &record(7)).unwrap();

        let back: Option<Record> = db.get_transfer(7).unwrap();
        assert_eq!(back, Some(record(7)));

        let missing: Option<Record> = db.get_transfer(8).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn overwrite_replaces_record() {
        let db = LedgerDb::open_temporary().unwrap();
        db.put_transfer(1, &record(1)).unwrap();
        let updated = Record {
            id: 1,
            note: "settled".into(),
        };
        db.put_transfer(1, &updated).unwrap();

        assert_eq!(db.transfer_count(), 1);
        assert_eq!(db.get_transfer::<Record>(1).unwrap(), Some(updated));
    }

    #[test]
    fn load_returns_records_in_id_order() {
        let db = LedgerDb::open_temporary().unwrap();
        // 256 sorts after 2 only with big-endian keys.
        for id in [256u64, 2, 1, 3] {
            db.put_transfer(id, &record(id)).unwrap();
        }
        let ids: Vec<u64> = db
            .load_transfers::<Record>()
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 256]);
    }

    #[test]
    fn balances_roundtrip() {
        let db = LedgerDb::open_temporary().unwrap();
        db.put_balances([("alice", "native", 10), ("bob", "usdc", 20)])
            .unwrap();
        db.put_balances([("alice", "native", 4)]).unwrap();

        let mut balances = db.load_balances().unwrap();
        balances.sort();
        assert_eq!(
            balances,
            vec![
                ("alice".to_string(), "native".to_string(), 4),
                ("bob".to_string(), "usdc".to_string(), 20),
            ]
        );
    }

    #[test]
    fn nul_bytes_in_ids_keep_balances_apart() {
        let db = LedgerDb::open_temporary().unwrap();
        db.put_balances([("a\0b", "native", 5)]).unwrap();
        assert_eq!(
            db.load_balances().unwrap(),
            vec![("a\0b".to_string(), "native".to_string(), 5)]
        );

        // Same concatenated bytes, different split.
        db.put_balances([("x\0y", "c", 5), ("x", "y\0c", 7)]).unwrap();
        let mut balances = db.load_balances().unwrap();
        balances.sort();
        assert_eq!(
            balances,
            vec![
                ("a\0b".to_string(), "native".to_string(), 5),
                ("x".to_string(), "y\0c".to_string(), 7),
                ("x\0y".to_string(), "c".to_string(), 5),
            ]
        );
    }

    #[test]
    fn empty_account_and_asset_roundtrip() {
        let db = LedgerDb::open_temporary().unwrap();
        db.put_balances([("", "", 1), ("", "native", 2)]).unwrap();
        let mut balances = db.load_balances().unwrap();
        balances.sort();
        assert_eq!(
            balances,
            vec![
                (String::new(), String::new(), 1),
                (String::new(), "native".to_string(), 2),
            ]
        );
    }

    #[test]
    fn truncated_balance_key_is_corrupt() {
        let db = LedgerDb::open_temporary().unwrap();
        // Claims a 9-byte account but carries one byte.
        db.balances
            .insert(&[0u8, 0, 0, 9, b'a'][..], &7u64.to_be_bytes())
            .unwrap();
        assert!(matches!(
            db.load_balances(),
            Err(DbError::Corrupt { tree: "balances", .. })
        ));
    }

    #[test]
    fn commit_transfer_writes_record_counter_and_balances_together() {
        let db = LedgerDb::open_temporary().unwrap();
        db.commit_transfer(3, &record(3), 4, [("alice", "native", 90), ("bob", "native", 10)])
            .unwrap();

        assert_eq!(db.get_transfer::<Record>(3).unwrap(), Some(record(3)));
        assert_eq!(db.next_transfer_id().unwrap(), Some(4));
        let mut balances = db.load_balances().unwrap();
        balances.sort();
        assert_eq!(
            balances,
            vec![
                ("alice".to_string(), "native".to_string(), 90),
                ("bob".to_string(), "native".to_string(), 10),
            ]
        );
    }

    #[test]
    fn commit_transfer_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = LedgerDb::open(dir.path()).expect("open");
            db.commit_transfer(1, &record(1), 2, [("carol", "usdc", 5)])
                .unwrap();
            db.flush().unwrap();
        }

        let db = LedgerDb::open(dir.path()).expect("reopen");
        assert_eq!(db.get_transfer::<Record>(1).unwrap(), Some(record(1)));
        assert_eq!(db.next_transfer_id().unwrap(), Some(2));
        assert_eq!(
            db.load_balances().unwrap(),
            vec![("carol".to_string(), "usdc".to_string(), 5)]
        );
    }

    #[test]
    fn next_transfer_id_roundtrip() {
        let db = LedgerDb::open_temporary().unwrap();
        db.set_next_transfer_id(42).unwrap();
        assert_eq!(db.next_transfer_id().unwrap(), Some(42));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let db = LedgerDb::open(dir.path()).expect("open");
            db.put_transfer(1, &record(1)).unwrap();
            db.set_next_transfer_id(2).unwrap();
            db.flush().unwrap();
        }

        let db = LedgerDb::open(dir.path()).expect("reopen");
        assert_eq!(db.get_transfer::<Record>(1).unwrap(), Some(record(1)));
        assert_eq!(db.next_transfer_id().unwrap(), Some(2));
    }
}
