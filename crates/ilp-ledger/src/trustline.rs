use crate::accountant::{
    account_mut, adjust_balance, trustline_levels, Accounts, MAX_SUB_ACCOUNT_DEPTH,
};
use crate::store::{LedgerBatch, LedgerStore};
use crate::{Accountant, AccountId};
use ilp_errors::{LedgerError, LedgerStoreError, TrustlineError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A change to the credit a parent account extends to one of its
/// sub-accounts. Each variant is applied at every level between the
/// sub-account and its top-level ancestor.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrustlineOperation {
    /// Grow the credit available to the account. With `auto_apply` the
    /// credit is utilized immediately instead.
    Extend {
        account_id: AccountId,
        amount: u64,
        auto_apply: bool,
    },
    /// Draw on extended credit: the top-level ancestor's balance moves to the
    /// account and the amount is recorded as borrowed.
    Utilize { account_id: AccountId, amount: u64 },
    /// Shrink the credit available to the account.
    Revoke { account_id: AccountId, amount: u64 },
    /// Repay borrowed value to the top-level ancestor. With `revolve` the
    /// repaid amount becomes available to draw again.
    Settle {
        account_id: AccountId,
        amount: u64,
        revolve: bool,
    },
}

impl TrustlineOperation {
    pub fn account_id(&self) -> AccountId {
        match self {
            TrustlineOperation::Extend { account_id, .. }
            | TrustlineOperation::Utilize { account_id, .. }
            | TrustlineOperation::Revoke { account_id, .. }
            | TrustlineOperation::Settle { account_id, .. } => *account_id,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            TrustlineOperation::Extend { amount, .. }
            | TrustlineOperation::Utilize { amount, .. }
            | TrustlineOperation::Revoke { amount, .. }
            | TrustlineOperation::Settle { amount, .. } => *amount,
        }
    }
}

fn from_ledger(err: LedgerError) -> TrustlineError {
    match err {
        LedgerError::UnknownAccount(id) => TrustlineError::UnknownAccount(id),
        LedgerError::AmountOverflow(id) => TrustlineError::AmountOverflow(id),
        LedgerError::Store(err) => TrustlineError::Store(err),
        other => TrustlineError::Store(LedgerStoreError::other(other)),
    }
}

impl<S> Accountant<S>
where
    S: LedgerStore,
{
    /// Apply a trustline operation atomically across the account and all of
    /// its ancestors.
    pub async fn adjust_trustline(
        &self,
        operation: TrustlineOperation,
    ) -> Result<(), TrustlineError> {
        let account_id = operation.account_id();
        let chain = self.ancestors(account_id).await?;
        let mut ids = vec![account_id];
        ids.extend(chain.iter().copied());

        let _guards = self.lock(ids.iter().copied()).await;
        let mut accounts = self.load(&ids).await.map_err(from_ledger)?;
        apply(&mut accounts, account_id, &chain, &operation)?;

        let mut updated: Vec<_> = accounts.into_iter().map(|(_, account)| account).collect();
        updated.sort_by_key(|account| account.id);
        self.store
            .write(LedgerBatch {
                accounts: updated,
                reservations: vec![],
            })
            .await?;
        debug!("Applied trustline operation {:?}", operation);
        Ok(())
    }

    /// Ancestors of the account, nearest first
    async fn ancestors(&self, account_id: AccountId) -> Result<Vec<AccountId>, TrustlineError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(TrustlineError::UnknownAccount(account_id))?;
        let mut next = account
            .parent_account_id
            .ok_or(TrustlineError::UnknownSuperAccount(account_id))?;

        let mut chain = Vec::new();
        loop {
            if chain.len() == MAX_SUB_ACCOUNT_DEPTH {
                return Err(TrustlineError::MaxDepthExceeded(account_id));
            }
            let parent = self
                .store
                .get_account(next)
                .await?
                .ok_or(TrustlineError::UnknownSuperAccount(account_id))?;
            chain.push(parent.id);
            match parent.parent_account_id {
                Some(parent_id) => next = parent_id,
                None => return Ok(chain),
            }
        }
    }
}

fn apply(
    accounts: &mut Accounts,
    account_id: AccountId,
    chain: &[AccountId],
    operation: &TrustlineOperation,
) -> Result<(), TrustlineError> {
    let amount = operation.amount();
    let account = account_mut(accounts, account_id).map_err(from_ledger)?;
    match operation {
        TrustlineOperation::Utilize { .. } | TrustlineOperation::Revoke { .. }
            if account.trustline_available == 0 =>
        {
            return Err(TrustlineError::UnknownTrustline(account_id));
        }
        TrustlineOperation::Settle { .. } if account.borrowed == 0 => {
            return Err(TrustlineError::UnknownTrustline(account_id));
        }
        _ => {}
    }

    let levels: Vec<(AccountId, AccountId)> = trustline_levels(account_id, chain)
        .into_iter()
        .zip(chain.iter().copied())
        .collect();
    let top = chain[chain.len() - 1];

    for (lower, upper) in levels {
        match operation {
            TrustlineOperation::Extend {
                auto_apply: false, ..
            } => extend(accounts, lower, upper, amount)?,
            TrustlineOperation::Extend {
                auto_apply: true, ..
            } => lend(accounts, lower, upper, amount)?,
            TrustlineOperation::Utilize { .. } => {
                withdraw_credit(accounts, lower, upper, amount)?;
                lend(accounts, lower, upper, amount)?;
            }
            TrustlineOperation::Revoke { .. } => withdraw_credit(accounts, lower, upper, amount)?,
            TrustlineOperation::Settle { revolve, .. } => {
                repay(accounts, lower, upper, amount)?;
                if *revolve {
                    extend(accounts, lower, upper, amount)?;
                }
            }
        }
    }

    match operation {
        TrustlineOperation::Extend {
            auto_apply: true, ..
        }
        | TrustlineOperation::Utilize { .. } => move_balance(accounts, top, account_id, amount),
        TrustlineOperation::Settle { .. } => move_balance(accounts, account_id, top, amount),
        _ => Ok(()),
    }
}

fn level(
    accounts: &mut Accounts,
    account_id: AccountId,
) -> Result<&mut crate::Account, TrustlineError> {
    account_mut(accounts, account_id).map_err(from_ledger)
}

fn extend(
    accounts: &mut Accounts,
    lower: AccountId,
    upper: AccountId,
    amount: u64,
) -> Result<(), TrustlineError> {
    let account = level(accounts, lower)?;
    account.trustline_available = account
        .trustline_available
        .checked_add(amount)
        .ok_or(TrustlineError::AmountOverflow(lower))?;
    let parent = level(accounts, upper)?;
    parent.credit_extended = parent
        .credit_extended
        .checked_add(amount)
        .ok_or(TrustlineError::AmountOverflow(upper))?;
    Ok(())
}

fn withdraw_credit(
    accounts: &mut Accounts,
    lower: AccountId,
    upper: AccountId,
    amount: u64,
) -> Result<(), TrustlineError> {
    let account = level(accounts, lower)?;
    if account.undrawn_trustline() < amount {
        return Err(TrustlineError::InsufficientBalance(lower));
    }
    account.trustline_available -= amount;
    let parent = level(accounts, upper)?;
    parent.credit_extended = parent.credit_extended.saturating_sub(amount);
    Ok(())
}

fn lend(
    accounts: &mut Accounts,
    lower: AccountId,
    upper: AccountId,
    amount: u64,
) -> Result<(), TrustlineError> {
    let account = level(accounts, lower)?;
    account.borrowed = account
        .borrowed
        .checked_add(amount)
        .ok_or(TrustlineError::AmountOverflow(lower))?;
    let parent = level(accounts, upper)?;
    parent.lent = parent
        .lent
        .checked_add(amount)
        .ok_or(TrustlineError::AmountOverflow(upper))?;
    Ok(())
}

fn repay(
    accounts: &mut Accounts,
    lower: AccountId,
    upper: AccountId,
    amount: u64,
) -> Result<(), TrustlineError> {
    let account = level(accounts, lower)?;
    if account.borrowed < amount {
        return Err(TrustlineError::InsufficientBalance(lower));
    }
    account.borrowed -= amount;
    let parent = level(accounts, upper)?;
    parent.lent = parent.lent.saturating_sub(amount);
    Ok(())
}

/// Move posted balance, keeping the payer within its own credit line
fn move_balance(
    accounts: &mut Accounts,
    from: AccountId,
    to: AccountId,
    amount: u64,
) -> Result<(), TrustlineError> {
    let payer = level(accounts, from)?;
    if payer
        .headroom()
        .map_or(false, |headroom| headroom < i128::from(amount))
    {
        return Err(TrustlineError::InsufficientBalance(from));
    }
    adjust_balance(payer, -i128::from(amount)).map_err(from_ledger)?;
    let payee = level(accounts, to)?;
    adjust_balance(payee, i128::from(amount)).map_err(from_ledger)
}
