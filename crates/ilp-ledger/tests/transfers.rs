use futures::future::join_all;
use ilp_errors::{LedgerError, Leg};
use ilp_ledger::*;
use uuid::Uuid;

fn settings(asset_scale: u8, credit_line: CreditLine) -> AccountSettings {
    AccountSettings {
        id: Uuid::new_v4(),
        asset_code: "USD".to_string(),
        asset_scale,
        credit_line,
        parent_account_id: None,
        rollup: false,
    }
}

async fn pair(
    source_scale: u8,
    destination_scale: u8,
) -> (Accountant<InMemoryLedgerStore>, AccountId, AccountId) {
    pair_with_credit(source_scale, destination_scale, CreditLine::Limited(1_000_000)).await
}

async fn pair_with_credit(
    source_scale: u8,
    destination_scale: u8,
    source_credit: CreditLine,
) -> (Accountant<InMemoryLedgerStore>, AccountId, AccountId) {
    let accountant = Accountant::new(InMemoryLedgerStore::new());
    let source = accountant
        .create_account(settings(source_scale, source_credit))
        .await
        .unwrap();
    let destination = accountant
        .create_account(settings(destination_scale, CreditLine::Unlimited))
        .await
        .unwrap();
    (accountant, source.id, destination.id)
}

#[tokio::test]
async fn transfer_normalizes_into_destination_scale() {
    let (accountant, source, destination) = pair(2, 9).await;
    let transfer = accountant
        .transfer_normalized(Uuid::new_v4(), source, destination, 500)
        .await
        .unwrap();
    assert_eq!(transfer.debit.amount, 500);
    assert_eq!(transfer.credit.amount, 5_000_000_000);

    accountant.commit_transfer(&transfer).await.unwrap();
    assert_eq!(accountant.get_balance(source).await.unwrap(), -500);
    assert_eq!(accountant.get_balance(destination).await.unwrap(), 5_000_000_000);
    assert!(accountant.rounding_losses().await.unwrap().is_empty());
}

#[tokio::test]
async fn scale_down_records_rounding_loss() {
    let (accountant, source, destination) = pair_with_credit(9, 2, CreditLine::Unlimited).await;
    let transfer_id = Uuid::new_v4();
    let transfer = accountant
        .transfer_normalized(transfer_id, source, destination, 5_000_000_123)
        .await
        .unwrap();
    assert_eq!(transfer.credit.amount, 500);

    let losses = accountant.rounding_losses().await.unwrap();
    assert_eq!(
        losses,
        vec![RoundingLoss {
            transfer_id,
            account_id: destination,
            remainder: 123,
            from_scale: 9,
            to_scale: 2,
        }]
    );
}

#[tokio::test]
async fn transfer_to_same_account_is_rejected() {
    let (accountant, source, _) = pair(2, 2).await;
    assert!(matches!(
        accountant
            .transfer_normalized(Uuid::new_v4(), source, source, 1)
            .await,
        Err(LedgerError::SameAccounts)
    ));
}

#[tokio::test]
async fn failed_reservation_holds_neither_leg() {
    let (accountant, source, destination) = pair(2, 2).await;
    let result = accountant
        .transfer(TransferRequest {
            transfer_id: Uuid::new_v4(),
            source_account_id: source,
            destination_account_id: destination,
            source_amount: 1_000_001,
            destination_amount: 1_000_001,
        })
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientTrustline { .. })
    ));
    assert_eq!(accountant.get_available(source).await.unwrap(), 0);
    assert_eq!(
        accountant
            .get_account(destination)
            .await
            .unwrap()
            .pending_credits,
        0
    );
    assert_eq!(accountant.store().reservation_count(), 0);
}

#[tokio::test]
async fn rollback_transfer_releases_both_legs() {
    let (accountant, source, destination) = pair(2, 2).await;
    let transfer = accountant
        .transfer_normalized(Uuid::new_v4(), source, destination, 700)
        .await
        .unwrap();
    assert_eq!(accountant.get_available(source).await.unwrap(), -700);

    accountant.rollback_transfer(&transfer).await.unwrap();
    assert_eq!(accountant.get_available(source).await.unwrap(), 0);
    assert_eq!(accountant.get_balance(destination).await.unwrap(), 0);
    assert!(matches!(
        accountant.commit_transfer(&transfer).await,
        Err(LedgerError::AlreadyTerminal(_))
    ));

    accountant.finalize_transfer(&transfer).await.unwrap();
    assert_eq!(accountant.store().reservation_count(), 0);
}

#[tokio::test]
async fn credit_leg_failure_is_a_partial_settlement() {
    let (accountant, source, destination) = pair(2, 2).await;
    let transfer = accountant
        .transfer_normalized(Uuid::new_v4(), source, destination, 100)
        .await
        .unwrap();

    // The debit leg is written, the credit leg is not
    accountant.store().fail_writes(1, 1);
    let err = accountant.commit_transfer(&transfer).await.unwrap_err();
    assert!(err.is_fatal());
    match err {
        LedgerError::PartialSettlement {
            transfer_id,
            committed,
            failed,
            ..
        } => {
            assert_eq!(transfer_id, transfer.id);
            assert_eq!(committed, Leg::Debit);
            assert_eq!(failed, Leg::Credit);
        }
        other => panic!("expected partial settlement, got {:?}", other),
    }
    assert_eq!(accountant.get_balance(source).await.unwrap(), -100);
    assert_eq!(accountant.get_balance(destination).await.unwrap(), 0);
}

#[tokio::test]
async fn storage_failure_before_any_leg_commits_nothing() {
    let (accountant, source, destination) = pair(2, 2).await;
    let transfer = accountant
        .transfer_normalized(Uuid::new_v4(), source, destination, 100)
        .await
        .unwrap();

    accountant.store().fail_writes(0, 1);
    let err = accountant.commit_transfer(&transfer).await.unwrap_err();
    assert!(matches!(err, LedgerError::Store(_)));
    assert_eq!(accountant.get_balance(source).await.unwrap(), 0);

    // Still open, so it can be released
    accountant.rollback_transfer(&transfer).await.unwrap();
    assert_eq!(accountant.get_available(source).await.unwrap(), 0);
}

#[tokio::test]
async fn release_account_rolls_back_every_open_transfer() {
    let (accountant, source, destination) = pair(2, 2).await;
    let other = accountant
        .create_account(settings(2, CreditLine::Unlimited))
        .await
        .unwrap()
        .id;

    let first = accountant
        .transfer_normalized(Uuid::new_v4(), source, destination, 10)
        .await
        .unwrap();
    let second = accountant
        .transfer_normalized(Uuid::new_v4(), other, destination, 20)
        .await
        .unwrap();
    let unrelated = accountant
        .transfer_normalized(Uuid::new_v4(), other, source, 30)
        .await
        .unwrap();
    let standalone = accountant
        .reserve(destination, 5, Direction::Debit)
        .await
        .unwrap();

    let mut released = accountant.release_account(destination).await.unwrap();
    released.sort();
    let mut expected = vec![first.id, second.id, standalone.id];
    expected.sort();
    assert_eq!(released, expected);

    assert_eq!(accountant.get_available(destination).await.unwrap(), 0);
    assert_eq!(
        accountant
            .get_account(destination)
            .await
            .unwrap()
            .pending_credits,
        0
    );
    // The transfer between the other two accounts is untouched
    assert_eq!(accountant.get_available(other).await.unwrap(), -30);
    accountant.commit_transfer(&unrelated).await.unwrap();
    assert_eq!(accountant.get_balance(source).await.unwrap(), 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_respect_the_credit_line() {
    let accountant = Accountant::new(InMemoryLedgerStore::new());
    let account = accountant
        .create_account(settings(2, CreditLine::Limited(100)))
        .await
        .unwrap()
        .id;

    let attempts = (0..50).map(|_| {
        let accountant = accountant.clone();
        tokio::spawn(async move { accountant.reserve(account, 10, Direction::Debit).await })
    });
    let results = join_all(attempts).await;
    let succeeded = results
        .into_iter()
        .filter(|result| matches!(result, Ok(Ok(_))))
        .count();
    assert_eq!(succeeded, 10);
    assert_eq!(accountant.get_available(account).await.unwrap(), -100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_do_not_deadlock() {
    let accountant = Accountant::new(InMemoryLedgerStore::new());
    let a = accountant
        .create_account(settings(2, CreditLine::Unlimited))
        .await
        .unwrap()
        .id;
    let b = accountant
        .create_account(settings(2, CreditLine::Unlimited))
        .await
        .unwrap()
        .id;

    let transfers = (0..100).map(|i| {
        let accountant = accountant.clone();
        let (source, destination) = if i % 2 == 0 { (a, b) } else { (b, a) };
        tokio::spawn(async move {
            let transfer = accountant
                .transfer_normalized(Uuid::new_v4(), source, destination, 1)
                .await?;
            accountant.commit_transfer(&transfer).await
        })
    });
    for result in join_all(transfers).await {
        result.unwrap().unwrap();
    }
    assert_eq!(accountant.get_balance(a).await.unwrap(), 0);
    assert_eq!(accountant.get_balance(b).await.unwrap(), 0);
}
