//! Property tests: no sequence of operations settles a transfer twice.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use passlock_contracts::{LedgerConfig, TransferLedger, TransferStatus};
use passlock_protocol::asset::{AccountId, AssetId, BalanceBook};
use passlock_protocol::timing::{Clock, ManualClock};
use proptest::prelude::*;

const PASSWORD: &str = "swordfish-2026";

#[derive(Debug, Clone)]
enum Op {
    Advance(i64),
    Cancel,
    Claim { correct: bool },
    Reclaim,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..7_200).prop_map(Op::Advance),
        Just(Op::Cancel),
        any::<bool>().prop_map(|correct| Op::Claim { correct }),
        Just(Op::Reclaim),
    ]
}

proptest! {
    #[test]
    fn settles_at_most_once(
        ttl_secs in 1i64..14_400,
        ops in proptest::collection::vec(op(), 1..24),
    ) {
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        let book = Arc::new(BalanceBook::new());
        book.deposit(&alice, &AssetId::Native, 1_000_000).unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()));
        let ledger = TransferLedger::new(LedgerConfig::default(), book.clone(), clock.clone()).unwrap();

        let id = ledger
            .create(&alice, &bob, &AssetId::Native, 10_000, PASSWORD, clock.now() + Duration::seconds(ttl_secs))
            .unwrap();
        let fee = ledger.get_transfer(id).unwrap().fee_amount;

        let mut settlements = 0;
        for op in ops {
            let result = match op {
                Op::Advance(secs) => {
                    clock.advance(Duration::seconds(secs));
                    continue;
                }
                Op::Cancel => ledger.cancel(id, &alice),
                Op::Claim { correct } => {
                    let password = if correct { PASSWORD } else { "not the password" };
                    ledger.claim(id, &bob, password)
                }
                Op::Reclaim => ledger.reclaim_expired(id, &bob),
            };
            if result.is_ok() {
                settlements += 1;
            }
        }

        prop_assert!(settlements <= 1);
        let status = ledger.get_transfer(id).unwrap().status;
        prop_assert_eq!(status.is_terminal(), settlements == 1);

        let to_alice = book.balance_of(&alice, &AssetId::Native);
        let to_bob = book.balance_of(&bob, &AssetId::Native);
        match status {
            TransferStatus::Pending => {
                prop_assert_eq!(to_alice, 1_000_000 - 10_000 - fee);
                prop_assert_eq!(to_bob, 0);
            }
            TransferStatus::Claimed => {
                prop_assert_eq!(to_alice, 1_000_000 - 10_000 - fee);
                prop_assert_eq!(to_bob, 10_000);
            }
            TransferStatus::Canceled | TransferStatus::ExpiredAndRefunded => {
                prop_assert_eq!(to_alice, 1_000_000 - fee);
                prop_assert_eq!(to_bob, 0);
            }
        }
    }
}
