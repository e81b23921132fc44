use crate::asset::normalize_with_remainder;
use crate::store::{LedgerBatch, LedgerStore};
use crate::{
    Account, AccountId, AccountSettings, Direction, Reservation, ReservationState, RoundingLoss,
    Transfer, TransferRequest,
};
use dashmap::DashMap;
use ilp_errors::{LedgerError, Leg};
use std::collections::{BTreeSet, HashMap};
use std::convert::TryFrom;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// Sub-account trees deeper than this are not walked
pub const MAX_SUB_ACCOUNT_DEPTH: usize = 64;

pub(crate) type Accounts = HashMap<AccountId, Account>;

/// # Ledger Accountant
///
/// Owns every account and reservation record and keeps the trustline
/// invariant (`balance >= -credit_line`) for each of them.
///
/// Every read-modify-write of an account runs while holding that account's
/// lock. Operations touching several accounts take their locks in ascending
/// account id order, so two transfers over the same pair of accounts can
/// never deadlock. There is no lock spanning all accounts.
#[derive(Clone)]
pub struct Accountant<S> {
    pub(crate) store: S,
    locks: Arc<DashMap<AccountId, Arc<Mutex<()>>>>,
}

impl<S> Accountant<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Accountant {
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lock the given accounts in ascending id order
    pub(crate) async fn lock<I>(&self, ids: I) -> Vec<OwnedMutexGuard<()>>
    where
        I: IntoIterator<Item = AccountId>,
    {
        let ids: BTreeSet<AccountId> = ids.into_iter().collect();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            // The map entry guard is dropped before awaiting the lock
            let lock = self.locks.entry(id).or_default().value().clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    pub(crate) async fn load(&self, ids: &[AccountId]) -> Result<Accounts, LedgerError> {
        let mut accounts = HashMap::with_capacity(ids.len());
        for id in ids {
            if accounts.contains_key(id) {
                continue;
            }
            let account = self
                .store
                .get_account(*id)
                .await?
                .ok_or(LedgerError::UnknownAccount(*id))?;
            accounts.insert(*id, account);
        }
        Ok(accounts)
    }

    async fn fetch_reservation(&self, reservation_id: Uuid) -> Result<Reservation, LedgerError> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .ok_or(LedgerError::UnknownReservation(reservation_id))
    }

    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::UnknownAccount(account_id))
    }

    /// The posted balance
    pub async fn get_balance(&self, account_id: AccountId) -> Result<i64, LedgerError> {
        Ok(self.get_account(account_id).await?.balance)
    }

    /// The posted balance minus open debit reservations
    pub async fn get_available(&self, account_id: AccountId) -> Result<i128, LedgerError> {
        Ok(self.get_account(account_id).await?.available())
    }

    pub async fn create_account(&self, settings: AccountSettings) -> Result<Account, LedgerError> {
        let _guards = self.lock(vec![settings.id]).await;
        if self.store.get_account(settings.id).await?.is_some() {
            return Err(LedgerError::AccountExists(settings.id));
        }
        self.insert_account(settings).await
    }

    /// Create the account, or update the credit line, parent and rollup flag
    /// of an existing one. The asset code and scale of an existing account
    /// cannot change.
    pub async fn configure_account(
        &self,
        settings: AccountSettings,
    ) -> Result<Account, LedgerError> {
        let _guards = self.lock(vec![settings.id]).await;
        let mut account = match self.store.get_account(settings.id).await? {
            Some(account) => account,
            None => return self.insert_account(settings).await,
        };

        if account.settings_conflict(&settings) {
            return Err(LedgerError::AssetScaleMismatch {
                account_id: account.id,
                current_code: account.asset_code,
                current_scale: account.asset_scale,
                requested_code: settings.asset_code,
                requested_scale: settings.asset_scale,
            });
        }
        if let Some(parent_id) = settings.parent_account_id {
            self.get_account(parent_id).await?;
        }

        account.credit_line = settings.credit_line;
        account.parent_account_id = settings.parent_account_id;
        account.rollup = settings.rollup;
        self.store
            .write(LedgerBatch {
                accounts: vec![account.clone()],
                reservations: vec![],
            })
            .await?;
        debug!("Updated settings of account {}", account.id);
        Ok(account)
    }

    async fn insert_account(&self, settings: AccountSettings) -> Result<Account, LedgerError> {
        if let Some(parent_id) = settings.parent_account_id {
            self.get_account(parent_id).await?;
        }
        let account = Account::new(settings);
        self.store
            .write(LedgerBatch {
                accounts: vec![account.clone()],
                reservations: vec![],
            })
            .await?;
        debug!(
            "Created account {} ({} at scale {})",
            account.id, account.asset_code, account.asset_scale
        );
        Ok(account)
    }

    /// The ancestors a rollup reservation on `account` may draw on, nearest
    /// first. Empty if the account does not roll up.
    async fn rollup_chain(&self, account: &Account) -> Result<Vec<AccountId>, LedgerError> {
        let mut chain = Vec::new();
        if !account.rollup {
            return Ok(chain);
        }
        let mut next = account.parent_account_id;
        while let Some(parent_id) = next {
            if chain.len() == MAX_SUB_ACCOUNT_DEPTH || parent_id == account.id {
                warn!(
                    "Account {} is nested too deeply to roll up to its ancestors",
                    account.id
                );
                return Ok(Vec::new());
            }
            chain.push(parent_id);
            next = self.get_account(parent_id).await?.parent_account_id;
        }
        Ok(chain)
    }

    /// Hold `amount` on the account without posting it.
    pub async fn reserve(
        &self,
        account_id: AccountId,
        amount: u64,
        direction: Direction,
    ) -> Result<Reservation, LedgerError> {
        let account = self.get_account(account_id).await?;
        let chain = self.rollup_chain(&account).await?;
        let mut ids = vec![account_id];
        ids.extend(chain.iter().copied());

        let _guards = self.lock(ids.iter().copied()).await;
        let mut accounts = self.load(&ids).await?;
        let mut reservation = Reservation::new(account_id, amount, direction, None);
        hold(&mut accounts, &mut reservation, &chain)?;

        self.store
            .write(batch_for(&accounts, &reservation.accounts(), vec![reservation.clone()]))
            .await?;
        trace!(
            "Reserved {:?} of {} on account {}",
            direction,
            amount,
            account_id
        );
        Ok(reservation)
    }

    /// Post a reserved amount to the balance.
    pub async fn commit(&self, reservation_id: Uuid) -> Result<Reservation, LedgerError> {
        self.finish(reservation_id, ReservationState::Committed).await
    }

    /// Release a hold without touching the posted balance.
    pub async fn rollback(&self, reservation_id: Uuid) -> Result<Reservation, LedgerError> {
        self.finish(reservation_id, ReservationState::RolledBack)
            .await
    }

    async fn finish(
        &self,
        reservation_id: Uuid,
        state: ReservationState,
    ) -> Result<Reservation, LedgerError> {
        let reservation = self.fetch_reservation(reservation_id).await?;
        let _guards = self.lock(reservation.accounts()).await;

        // Another caller may have finished it while we waited
        let mut reservation = self.fetch_reservation(reservation_id).await?;
        if reservation.is_terminal() {
            return Err(LedgerError::AlreadyTerminal(reservation_id));
        }
        let ids = reservation.accounts();
        let mut accounts = self.load(&ids).await?;
        match state {
            ReservationState::Committed => post(&mut accounts, &reservation)?,
            _ => release(&mut accounts, &reservation),
        }
        reservation.state = state;

        self.store
            .write(batch_for(&accounts, &ids, vec![reservation.clone()]))
            .await?;
        trace!("Reservation {} is now {:?}", reservation_id, state);
        Ok(reservation)
    }

    /// Reserve both legs of a transfer: a debit on the source account and a
    /// credit on the destination account, each in its own scale. Neither leg
    /// is held if either cannot be.
    pub async fn transfer(&self, request: TransferRequest) -> Result<Transfer, LedgerError> {
        let TransferRequest {
            transfer_id,
            source_account_id,
            destination_account_id,
            source_amount,
            destination_amount,
        } = request;
        if source_account_id == destination_account_id {
            return Err(LedgerError::SameAccounts);
        }

        let source = self.get_account(source_account_id).await?;
        let chain = self.rollup_chain(&source).await?;
        let mut ids = vec![source_account_id, destination_account_id];
        ids.extend(chain.iter().copied());

        let _guards = self.lock(ids.iter().copied()).await;
        let mut accounts = self.load(&ids).await?;

        let mut debit = Reservation::new(
            source_account_id,
            source_amount,
            Direction::Debit,
            Some(transfer_id),
        );
        hold(&mut accounts, &mut debit, &chain)?;
        let mut credit = Reservation::new(
            destination_account_id,
            destination_amount,
            Direction::Credit,
            Some(transfer_id),
        );
        hold(&mut accounts, &mut credit, &[])?;

        let transfer = Transfer {
            id: transfer_id,
            debit,
            credit,
        };
        self.store
            .write(batch_for(
                &accounts,
                &transfer.accounts(),
                vec![transfer.debit.clone(), transfer.credit.clone()],
            ))
            .await?;
        debug!(
            "Reserved transfer {}: {} from account {} and {} to account {}",
            transfer_id, source_amount, source_account_id, destination_amount, destination_account_id
        );
        Ok(transfer)
    }

    /// Normalize `amount` from the source account's scale into the
    /// destination's, reserve the transfer and record any rounding loss.
    pub async fn transfer_normalized(
        &self,
        transfer_id: Uuid,
        source_account_id: AccountId,
        destination_account_id: AccountId,
        amount: u64,
    ) -> Result<Transfer, LedgerError> {
        if source_account_id == destination_account_id {
            return Err(LedgerError::SameAccounts);
        }
        let source = self.get_account(source_account_id).await?;
        let destination = self.get_account(destination_account_id).await?;
        let normalized =
            normalize_with_remainder(amount, source.asset_scale, destination.asset_scale)
                .ok_or(LedgerError::AmountOverflow(destination_account_id))?;

        let transfer = self
            .transfer(TransferRequest {
                transfer_id,
                source_account_id,
                destination_account_id,
                source_amount: amount,
                destination_amount: normalized.amount,
            })
            .await?;

        if normalized.remainder > 0 {
            let loss = RoundingLoss {
                transfer_id,
                account_id: destination_account_id,
                remainder: normalized.remainder,
                from_scale: source.asset_scale,
                to_scale: destination.asset_scale,
            };
            debug!("Recording rounding loss {:?}", loss);
            self.store.record_rounding_loss(loss).await?;
        }
        Ok(transfer)
    }

    /// Reassemble a transfer from its stored legs
    pub async fn get_transfer(&self, transfer_id: Uuid) -> Result<Option<Transfer>, LedgerError> {
        let legs = self.store.transfer_reservations(transfer_id).await?;
        let debit = legs
            .iter()
            .find(|leg| leg.direction == Direction::Debit)
            .cloned();
        let credit = legs
            .iter()
            .find(|leg| leg.direction == Direction::Credit)
            .cloned();
        Ok(match (debit, credit) {
            (Some(debit), Some(credit)) => Some(Transfer {
                id: transfer_id,
                debit,
                credit,
            }),
            _ => None,
        })
    }

    /// Post both legs. Both legs are validated before either is written; if
    /// the credit leg cannot be written after the debit leg was, the result
    /// is a `PartialSettlement` that must be reconciled by an operator.
    pub async fn commit_transfer(&self, transfer: &Transfer) -> Result<(), LedgerError> {
        let _guards = self.lock(transfer.accounts()).await;
        let mut debit = self.fetch_reservation(transfer.debit.id).await?;
        let mut credit = self.fetch_reservation(transfer.credit.id).await?;
        for leg in [&debit, &credit].iter() {
            if leg.is_terminal() {
                return Err(LedgerError::AlreadyTerminal(leg.id));
            }
        }

        let mut accounts = self.load(&transfer.accounts()).await?;
        post(&mut accounts, &debit)?;
        debit.state = ReservationState::Committed;
        let debit_batch = batch_for(&accounts, &debit.accounts(), vec![debit]);
        post(&mut accounts, &credit)?;
        credit.state = ReservationState::Committed;
        let credit_batch = batch_for(&accounts, &credit.accounts(), vec![credit]);

        self.store.write(debit_batch).await?;
        if let Err(err) = self.store.write(credit_batch).await {
            error!(
                "Transfer {} debited account {} but could not credit account {}: {}",
                transfer.id, transfer.debit.account_id, transfer.credit.account_id, err
            );
            return Err(LedgerError::PartialSettlement {
                transfer_id: transfer.id,
                committed: Leg::Debit,
                failed: Leg::Credit,
                reason: err.to_string(),
            });
        }
        debug!("Committed transfer {}", transfer.id);
        Ok(())
    }

    /// Release both legs in one write.
    pub async fn rollback_transfer(&self, transfer: &Transfer) -> Result<(), LedgerError> {
        let _guards = self.lock(transfer.accounts()).await;
        let mut debit = self.fetch_reservation(transfer.debit.id).await?;
        let mut credit = self.fetch_reservation(transfer.credit.id).await?;
        for leg in [&debit, &credit].iter() {
            if leg.is_terminal() {
                return Err(LedgerError::AlreadyTerminal(leg.id));
            }
        }

        let mut accounts = self.load(&transfer.accounts()).await?;
        release(&mut accounts, &debit);
        release(&mut accounts, &credit);
        debit.state = ReservationState::RolledBack;
        credit.state = ReservationState::RolledBack;

        self.store
            .write(batch_for(&accounts, &transfer.accounts(), vec![debit, credit]))
            .await?;
        debug!("Rolled back transfer {}", transfer.id);
        Ok(())
    }

    /// Roll back every open reservation touching the account, both legs of
    /// each transfer. Returns the ids of the transfers and standalone
    /// reservations released.
    pub async fn release_account(&self, account_id: AccountId) -> Result<Vec<Uuid>, LedgerError> {
        let open = self.store.open_reservations(account_id).await?;
        let mut transfers = BTreeSet::new();
        let mut standalone = Vec::new();
        for reservation in open {
            match reservation.transfer_id {
                Some(transfer_id) => {
                    transfers.insert(transfer_id);
                }
                None => standalone.push(reservation.id),
            }
        }

        let mut released = Vec::new();
        for transfer_id in transfers {
            let transfer = match self.get_transfer(transfer_id).await? {
                Some(transfer) => transfer,
                None => continue,
            };
            match self.rollback_transfer(&transfer).await {
                Ok(()) => released.push(transfer_id),
                // Settled concurrently by its packet
                Err(LedgerError::AlreadyTerminal(_)) | Err(LedgerError::UnknownReservation(_)) => {}
                Err(err) => return Err(err),
            }
        }
        for reservation_id in standalone {
            match self.rollback(reservation_id).await {
                Ok(_) => released.push(reservation_id),
                Err(LedgerError::AlreadyTerminal(_)) | Err(LedgerError::UnknownReservation(_)) => {}
                Err(err) => return Err(err),
            }
        }
        if !released.is_empty() {
            debug!(
                "Released {} open transfer(s) and reservation(s) on account {}",
                released.len(),
                account_id
            );
        }
        Ok(released)
    }

    /// Delete the legs of a transfer once both are terminal.
    pub async fn finalize_transfer(&self, transfer: &Transfer) -> Result<(), LedgerError> {
        self.finalize_reservation(transfer.debit.id).await?;
        self.finalize_reservation(transfer.credit.id).await
    }

    /// Delete a terminal reservation. Open reservations are left alone.
    pub async fn finalize_reservation(&self, reservation_id: Uuid) -> Result<(), LedgerError> {
        match self.store.get_reservation(reservation_id).await? {
            Some(reservation) if reservation.is_terminal() => {
                self.store.delete_reservation(reservation_id).await?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub async fn rounding_losses(&self) -> Result<Vec<RoundingLoss>, LedgerError> {
        Ok(self.store.rounding_losses().await?)
    }
}

pub(crate) fn account_mut(
    accounts: &mut Accounts,
    account_id: AccountId,
) -> Result<&mut Account, LedgerError> {
    accounts
        .get_mut(&account_id)
        .ok_or(LedgerError::UnknownAccount(account_id))
}

pub(crate) fn adjust_balance(account: &mut Account, delta: i128) -> Result<(), LedgerError> {
    account.balance = i64::try_from(i128::from(account.balance) + delta)
        .map_err(|_| LedgerError::AmountOverflow(account.id))?;
    Ok(())
}

fn batch_for(accounts: &Accounts, ids: &[AccountId], reservations: Vec<Reservation>) -> LedgerBatch {
    let touched: BTreeSet<&AccountId> = ids.iter().collect();
    LedgerBatch {
        accounts: touched
            .into_iter()
            .filter_map(|id| accounts.get(id).cloned())
            .collect(),
        reservations,
    }
}

/// Book the hold for a new reservation on the loaded accounts.
fn hold(
    accounts: &mut Accounts,
    reservation: &mut Reservation,
    chain: &[AccountId],
) -> Result<(), LedgerError> {
    let account_id = reservation.account_id;
    let amount = reservation.amount;

    if reservation.direction == Direction::Credit {
        let account = account_mut(accounts, account_id)?;
        let pending_credits = account
            .pending_credits
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow(account_id))?;
        if i128::from(account.balance) + i128::from(pending_credits) > i128::from(i64::MAX) {
            return Err(LedgerError::AmountOverflow(account_id));
        }
        account.pending_credits = pending_credits;
        return Ok(());
    }

    let account = account_mut(accounts, account_id)?;
    let headroom = account.headroom();
    let shortfall = match headroom {
        Some(headroom) if i128::from(amount) > headroom => {
            u64::try_from(i128::from(amount) - headroom)
                .map_err(|_| LedgerError::AmountOverflow(account_id))?
        }
        _ => 0,
    };

    if shortfall > 0 {
        let rollup = account.rollup;
        let insufficient = LedgerError::InsufficientTrustline {
            account_id,
            requested: amount,
            available: headroom.unwrap_or_default(),
        };
        if !rollup || chain.is_empty() || !can_draw(accounts, account_id, chain, shortfall) {
            return Err(insufficient);
        }
        // Drawing on parent-extended credit at every level down from the top
        let top = chain[chain.len() - 1];
        for lower in trustline_levels(account_id, chain) {
            let lower = account_mut(accounts, lower)?;
            lower.pending_drawn += shortfall;
        }
        hold_debit(account_mut(accounts, top)?, shortfall)?;
        reservation.drawn = shortfall;
        reservation.rollup_chain = chain.to_vec();
    }

    hold_debit(account_mut(accounts, account_id)?, amount - shortfall)
}

/// Add to an account's pending debits, refusing any hold that could not be
/// posted without taking the balance below `i64::MIN`.
fn hold_debit(account: &mut Account, amount: u64) -> Result<(), LedgerError> {
    let pending_debits = account
        .pending_debits
        .checked_add(amount)
        .ok_or(LedgerError::AmountOverflow(account.id))?;
    if i128::from(account.balance) - i128::from(pending_debits) < i128::from(i64::MIN) {
        return Err(LedgerError::AmountOverflow(account.id));
    }
    account.pending_debits = pending_debits;
    Ok(())
}

/// The accounts whose parent-extended trustline a draw passes through: the
/// account itself and every ancestor below the top-level one.
pub(crate) fn trustline_levels(account_id: AccountId, chain: &[AccountId]) -> Vec<AccountId> {
    let mut levels = vec![account_id];
    if chain.len() > 1 {
        levels.extend(chain[..chain.len() - 1].iter().copied());
    }
    levels
}

fn can_draw(accounts: &Accounts, account_id: AccountId, chain: &[AccountId], amount: u64) -> bool {
    let levels_have_credit = trustline_levels(account_id, chain).iter().all(|id| {
        accounts
            .get(id)
            .map_or(false, |account| account.undrawn_trustline() >= amount)
    });
    let top_has_headroom = chain
        .last()
        .and_then(|top| accounts.get(top))
        .map_or(false, |top| {
            top.headroom()
                .map_or(true, |headroom| headroom >= i128::from(amount))
        });
    levels_have_credit && top_has_headroom
}

/// Apply a reservation's amount to the posted balances.
fn post(accounts: &mut Accounts, reservation: &Reservation) -> Result<(), LedgerError> {
    let account_id = reservation.account_id;
    let amount = reservation.amount;
    match reservation.direction {
        Direction::Credit => {
            let account = account_mut(accounts, account_id)?;
            account.pending_credits = account.pending_credits.saturating_sub(amount);
            adjust_balance(account, i128::from(amount))
        }
        Direction::Debit => {
            let drawn = reservation.drawn;
            let own = amount - drawn;
            let account = account_mut(accounts, account_id)?;
            account.pending_debits = account.pending_debits.saturating_sub(own);
            adjust_balance(account, -i128::from(own))?;
            if drawn == 0 {
                return Ok(());
            }

            let chain = &reservation.rollup_chain;
            for (lower, upper) in trustline_levels(account_id, chain).into_iter().zip(chain) {
                let lower = account_mut(accounts, lower)?;
                lower.trustline_available = lower.trustline_available.saturating_sub(drawn);
                lower.pending_drawn = lower.pending_drawn.saturating_sub(drawn);
                lower.borrowed = lower
                    .borrowed
                    .checked_add(drawn)
                    .ok_or(LedgerError::AmountOverflow(lower.id))?;
                let upper = account_mut(accounts, *upper)?;
                upper.credit_extended = upper.credit_extended.saturating_sub(drawn);
                upper.lent = upper
                    .lent
                    .checked_add(drawn)
                    .ok_or(LedgerError::AmountOverflow(upper.id))?;
            }
            if let Some(top) = chain.last() {
                let top = account_mut(accounts, *top)?;
                top.pending_debits = top.pending_debits.saturating_sub(drawn);
                adjust_balance(top, -i128::from(drawn))?;
            }
            Ok(())
        }
    }
}

/// Undo a reservation's hold.
fn release(accounts: &mut Accounts, reservation: &Reservation) {
    let amount = reservation.amount;
    match reservation.direction {
        Direction::Credit => {
            if let Some(account) = accounts.get_mut(&reservation.account_id) {
                account.pending_credits = account.pending_credits.saturating_sub(amount);
            }
        }
        Direction::Debit => {
            let drawn = reservation.drawn;
            if let Some(account) = accounts.get_mut(&reservation.account_id) {
                account.pending_debits = account.pending_debits.saturating_sub(amount - drawn);
            }
            if drawn == 0 {
                return;
            }
            let chain = &reservation.rollup_chain;
            for lower in trustline_levels(reservation.account_id, chain) {
                if let Some(lower) = accounts.get_mut(&lower) {
                    lower.pending_drawn = lower.pending_drawn.saturating_sub(drawn);
                }
            }
            if let Some(top) = chain.last().and_then(|top| accounts.get_mut(top)) {
                top.pending_debits = top.pending_debits.saturating_sub(drawn);
            }
        }
    }
}
