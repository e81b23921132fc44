//! Property-based tests for the trustline invariant

use ilp_ledger::*;
use proptest::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug)]
enum Op {
    Reserve { amount: u64, debit: bool },
    Commit(usize),
    Rollback(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..200, any::<bool>()).prop_map(|(amount, debit)| Op::Reserve { amount, debit }),
        any::<usize>().prop_map(Op::Commit),
        any::<usize>().prop_map(Op::Rollback),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    /// Property: balance >= -credit_line at every point where nothing is reserved,
    /// and the available view never drops below the credit line either
    #[test]
    fn balance_respects_credit_line(
        credit_line in 0u64..500,
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let (floor, balance, available, settled) = runtime().block_on(async move {
            let accountant = Accountant::new(InMemoryLedgerStore::new());
            let account = accountant
                .create_account(AccountSettings {
                    id: Uuid::new_v4(),
                    asset_code: "EUR".to_string(),
                    asset_scale: 2,
                    credit_line: CreditLine::Limited(credit_line),
                    parent_account_id: None,
                    rollup: false,
                })
                .await
                .unwrap()
                .id;

            let mut open: Vec<Uuid> = Vec::new();
            let mut lowest_available = 0i128;
            for op in ops {
                match op {
                    Op::Reserve { amount, debit } => {
                        let direction = if debit { Direction::Debit } else { Direction::Credit };
                        if let Ok(reservation) = accountant.reserve(account, amount, direction).await {
                            open.push(reservation.id);
                        }
                    }
                    Op::Commit(index) if !open.is_empty() => {
                        let id = open.remove(index % open.len());
                        accountant.commit(id).await.unwrap();
                    }
                    Op::Rollback(index) if !open.is_empty() => {
                        let id = open.remove(index % open.len());
                        accountant.rollback(id).await.unwrap();
                    }
                    _ => {}
                }
                lowest_available = lowest_available.min(accountant.get_available(account).await.unwrap());
            }
            for id in open.drain(..) {
                accountant.rollback(id).await.unwrap();
            }
            let settled = accountant.get_account(account).await.unwrap();
            (
                -i128::from(credit_line),
                i128::from(settled.balance),
                lowest_available,
                settled.pending_debits == 0 && settled.pending_credits == 0,
            )
        });
        prop_assert!(balance >= floor);
        prop_assert!(available >= floor);
        prop_assert!(settled);
    }

    /// Property: committing a transfer moves exactly the normalized amounts
    #[test]
    fn committed_transfer_moves_normalized_amounts(
        amount in 0u64..1_000_000_000,
        source_scale in 0u8..10,
        destination_scale in 0u8..10,
    ) {
        let (debited, credited) = runtime().block_on(async move {
            let accountant = Accountant::new(InMemoryLedgerStore::new());
            let mut ids = Vec::new();
            for scale in [source_scale, destination_scale].iter() {
                let account = accountant
                    .create_account(AccountSettings {
                        id: Uuid::new_v4(),
                        asset_code: "EUR".to_string(),
                        asset_scale: *scale,
                        credit_line: CreditLine::Unlimited,
                        parent_account_id: None,
                        rollup: false,
                    })
                    .await
                    .unwrap();
                ids.push(account.id);
            }
            let transfer = accountant
                .transfer_normalized(Uuid::new_v4(), ids[0], ids[1], amount)
                .await
                .unwrap();
            accountant.commit_transfer(&transfer).await.unwrap();
            (
                accountant.get_balance(ids[0]).await.unwrap(),
                accountant.get_balance(ids[1]).await.unwrap(),
            )
        });
        prop_assert_eq!(debited, -(amount as i64));
        let expected = normalize(amount, source_scale, destination_scale).unwrap();
        prop_assert_eq!(credited, expected as i64);
    }
}
