use crate::{Account, AccountId, Reservation, ReservationState, RoundingLoss};
use async_trait::async_trait;
use dashmap::DashMap;
use ilp_errors::LedgerStoreError;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::{error::Error as StdError, fmt};
use uuid::Uuid;

/// A set of records written together. Either every record in the batch is
/// stored or none is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LedgerBatch {
    pub accounts: Vec<Account>,
    pub reservations: Vec<Reservation>,
}

impl LedgerBatch {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.reservations.is_empty()
    }
}

/// Durable storage behind the accountant.
///
/// The accountant serializes access per account, so implementations only
/// need to make each `write` atomic; they never see two concurrent writes
/// touching the same account.
#[async_trait]
pub trait LedgerStore: Clone + Send + Sync + 'static {
    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>, LedgerStoreError>;

    async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, LedgerStoreError>;

    /// Atomically store every record in the batch
    async fn write(&self, batch: LedgerBatch) -> Result<(), LedgerStoreError>;

    async fn delete_reservation(&self, reservation_id: Uuid) -> Result<(), LedgerStoreError>;

    /// Reservations still in the `Reserved` state that touch the account,
    /// including rollup reservations drawing on it as an ancestor
    async fn open_reservations(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Reservation>, LedgerStoreError>;

    /// Every leg recorded for a transfer, in any state
    async fn transfer_reservations(
        &self,
        transfer_id: Uuid,
    ) -> Result<Vec<Reservation>, LedgerStoreError>;

    async fn record_rounding_loss(&self, loss: RoundingLoss) -> Result<(), LedgerStoreError>;

    async fn rounding_losses(&self) -> Result<Vec<RoundingLoss>, LedgerStoreError>;
}

#[derive(Debug)]
struct InjectedFailure;

impl fmt::Display for InjectedFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("injected storage failure")
    }
}

impl StdError for InjectedFailure {}

#[derive(Default)]
struct FailurePlan {
    skip: usize,
    fail: usize,
}

/// A `LedgerStore` held in process memory.
///
/// Each instance owns its own records, so tests can create one per case.
/// Writes can be made to fail on purpose with `fail_writes`.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    accounts: Arc<DashMap<AccountId, Account>>,
    reservations: Arc<DashMap<Uuid, Reservation>>,
    rounding_losses: Arc<RwLock<Vec<RoundingLoss>>>,
    failures: Arc<Mutex<FailurePlan>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        InMemoryLedgerStore::default()
    }

    /// Let the next `skip` writes through, then fail the `fail` after them.
    pub fn fail_writes(&self, skip: usize, fail: usize) {
        *self.failures.lock() = FailurePlan { skip, fail };
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    fn check_injected_failure(&self) -> Result<(), LedgerStoreError> {
        let mut plan = self.failures.lock();
        if plan.skip > 0 {
            plan.skip -= 1;
            Ok(())
        } else if plan.fail > 0 {
            plan.fail -= 1;
            Err(LedgerStoreError::other(InjectedFailure))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>, LedgerStoreError> {
        Ok(self
            .accounts
            .get(&account_id)
            .map(|account| account.value().clone()))
    }

    async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Reservation>, LedgerStoreError> {
        Ok(self
            .reservations
            .get(&reservation_id)
            .map(|reservation| reservation.value().clone()))
    }

    async fn write(&self, batch: LedgerBatch) -> Result<(), LedgerStoreError> {
        self.check_injected_failure()?;
        for account in batch.accounts {
            self.accounts.insert(account.id, account);
        }
        for reservation in batch.reservations {
            self.reservations.insert(reservation.id, reservation);
        }
        Ok(())
    }

    async fn delete_reservation(&self, reservation_id: Uuid) -> Result<(), LedgerStoreError> {
        self.reservations.remove(&reservation_id);
        Ok(())
    }

    async fn open_reservations(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Reservation>, LedgerStoreError> {
        Ok(self
            .reservations
            .iter()
            .filter(|entry| {
                let reservation = entry.value();
                reservation.state == ReservationState::Reserved
                    && reservation.accounts().contains(&account_id)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn transfer_reservations(
        &self,
        transfer_id: Uuid,
    ) -> Result<Vec<Reservation>, LedgerStoreError> {
        Ok(self
            .reservations
            .iter()
            .filter(|entry| entry.value().transfer_id == Some(transfer_id))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn record_rounding_loss(&self, loss: RoundingLoss) -> Result<(), LedgerStoreError> {
        self.rounding_losses.write().push(loss);
        Ok(())
    }

    async fn rounding_losses(&self) -> Result<Vec<RoundingLoss>, LedgerStoreError> {
        Ok(self.rounding_losses.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountSettings, CreditLine, Direction};

    fn account() -> Account {
        Account::new(AccountSettings {
            id: Uuid::new_v4(),
            asset_code: "XRP".to_string(),
            asset_scale: 9,
            credit_line: CreditLine::Unlimited,
            parent_account_id: None,
            rollup: false,
        })
    }

    #[tokio::test]
    async fn injected_failures_skip_then_fail() {
        let store = InMemoryLedgerStore::new();
        store.fail_writes(1, 1);
        let first = account();
        let second = account();
        store
            .write(LedgerBatch {
                accounts: vec![first.clone()],
                reservations: vec![],
            })
            .await
            .unwrap();
        assert!(store
            .write(LedgerBatch {
                accounts: vec![second.clone()],
                reservations: vec![],
            })
            .await
            .is_err());
        assert!(store.get_account(first.id).await.unwrap().is_some());
        assert!(store.get_account(second.id).await.unwrap().is_none());
        // The plan is used up
        store
            .write(LedgerBatch {
                accounts: vec![second.clone()],
                reservations: vec![],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn open_reservations_only_lists_reserved() {
        let store = InMemoryLedgerStore::new();
        let account = account();
        let open = Reservation::new(account.id, 10, Direction::Debit, None);
        let mut done = Reservation::new(account.id, 10, Direction::Debit, None);
        done.state = ReservationState::Committed;
        store
            .write(LedgerBatch {
                accounts: vec![account.clone()],
                reservations: vec![open.clone(), done],
            })
            .await
            .unwrap();
        assert_eq!(store.open_reservations(account.id).await.unwrap(), vec![open]);
    }
}
