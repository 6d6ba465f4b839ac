//! Integration tests for the Passlock primitives.
//!
//! These walk a transfer's worth of primitives together without the ledger:
//! price the amount, pull it from a balance book, commit to a password,
//! watch the windows move on a manual clock, and persist the lot in a
//! temporary database. If these compose, the ledger only has to sequence
//! them.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use passlock_protocol::asset::{AccountId, AssetId, AssetMover, BalanceBook};
use passlock_protocol::crypto::{Blake3Commitment, CommitmentScheme, PasswordCommitment};
use passlock_protocol::fee::{FeeSchedule, FeeTier};
use passlock_protocol::storage::LedgerDb;
use passlock_protocol::timing::{Clock, CooldownPolicy, ManualClock, TransferPhase};

/// Minimal stand-in for a stored transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Escrow {
    sender: AccountId,
    receiver: AccountId,
    asset: AssetId,
    net_amount: u64,
    fee_amount: u64,
    password: PasswordCommitment,
}

#[test]
fn price_debit_commit_persist() {
    let db = LedgerDb::open_temporary().expect("temp db");
    let book = Arc::new(BalanceBook::new());
    let alice = AccountId::from("alice");
    let bob = AccountId::from("bob");
    book.deposit(&alice, &AssetId::Native, 2_000_000).unwrap();

    // Price it.
    let quote = FeeSchedule::default().quote(1_000_000).unwrap();
    assert_eq!(quote.tier, FeeTier::Two);
    assert_eq!(quote.fee, 5_000);

    // Pull amount + fee.
    book.debit(&alice, &AssetId::Native, quote.total).unwrap();
    assert_eq!(book.balance_of(&alice, &AssetId::Native), 995_000);

    // Commit to the password; only the commitment is stored.
    let scheme = Blake3Commitment;
    let escrow = Escrow {
        sender: alice.clone(),
        receiver: bob.clone(),
        asset: AssetId::Native,
        net_amount: quote.amount,
        fee_amount: quote.fee,
        password: scheme.commit("correct horse battery"),
    };
    db.put_transfer(1, &escrow).unwrap();
    db.set_next_transfer_id(2).unwrap();
    db.put_balances(
        book.entries()
            .iter()
            .map(|(a, s, v)| (a.as_str(), s.as_str(), *v))
            .collect::<Vec<_>>(),
    )
    .unwrap();

    // Read it all back.
    let stored: Escrow = db.get_transfer(1).unwrap().expect("stored");
    assert_eq!(stored, escrow);
    assert!(scheme.verify(&stored.password, "correct horse battery"));
    assert!(!scheme.verify(&stored.password, "correct horse battery "));
    assert_eq!(db.next_transfer_id().unwrap(), Some(2));

    // Release to the receiver.
    book.credit(&bob, &AssetId::Native, stored.net_amount).unwrap();
    assert_eq!(book.balance_of(&bob, &AssetId::Native), 1_000_000);
    // Fee is gone from circulation without a treasury.
    assert_eq!(book.total_of(&AssetId::Native), 2_000_000 - 5_000);

    let restored: Vec<(String, String, u64)> = db.load_balances().unwrap();
    assert!(restored.contains(&("alice".to_string(), "native".to_string(), 995_000)));
}

#[test]
fn windows_follow_the_clock() {
    let created = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
    let expires = created + Duration::hours(24);
    let clock = ManualClock::new(created);
    let policy = CooldownPolicy::from_secs(3_600).unwrap();

    assert_eq!(policy.phase(created, expires, clock.now()), TransferPhase::CancelWindow);

    // The deadline itself still belongs to the sender.
    clock.advance(Duration::hours(1));
    assert_eq!(policy.phase(created, expires, clock.now()), TransferPhase::CancelWindow);

    clock.advance(Duration::seconds(1));
    assert_eq!(policy.phase(created, expires, clock.now()), TransferPhase::ClaimWindow);

    clock.set(expires);
    assert_eq!(policy.phase(created, expires, clock.now()), TransferPhase::ClaimWindow);

    clock.advance(Duration::seconds(1));
    assert_eq!(policy.phase(created, expires, clock.now()), TransferPhase::Expired);
}

#[test]
fn expiry_inside_cooldown_skips_claim_window() {
    let created = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
    let expires = created + Duration::minutes(10);
    let policy = CooldownPolicy::from_secs(3_600).unwrap();

    let phases: Vec<TransferPhase> = (0..=60)
        .map(|m| policy.phase(created, expires, created + Duration::minutes(m)))
        .collect();
    assert!(!phases.contains(&TransferPhase::ClaimWindow));
    assert_eq!(phases.last(), Some(&TransferPhase::Expired));
}

#[test]
fn stored_records_load_in_id_order() {
    let db = LedgerDb::open_temporary().expect("temp db");
    let scheme = Blake3Commitment;
    // 256 and 1 would sort the wrong way with little-endian keys.
    for id in [256u64, 3, 1] {
        let escrow = Escrow {
            sender: AccountId::from("alice"),
            receiver: AccountId::from("bob"),
            asset: AssetId::token("usdc"),
            net_amount: id,
            fee_amount: 0,
            password: scheme.commit("hunter2hunter2"),
        };
        db.put_transfer(id, &escrow).unwrap();
    }

    let loaded: Vec<Escrow> = db.load_transfers().unwrap();
    let amounts: Vec<u64> = loaded.iter().map(|e| e.net_amount).collect();
    assert_eq!(amounts, vec![1, 3, 256]);
    assert_eq!(db.transfer_count(), 3);
}
