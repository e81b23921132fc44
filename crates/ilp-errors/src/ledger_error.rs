use crate::LedgerStoreError;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// One side of a two-leg transfer
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Leg {
    Debit,
    Credit,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Leg::Debit => f.write_str("debit"),
            Leg::Credit => f.write_str("credit"),
        }
    }
}

/// Errors for the Ledger Accountant
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("account {0} does not exist")]
    UnknownAccount(Uuid),
    #[error("account {0} already exists")]
    AccountExists(Uuid),
    #[error("reservation {0} does not exist")]
    UnknownReservation(Uuid),
    #[error("reservation {0} is already committed or rolled back")]
    AlreadyTerminal(Uuid),
    #[error("insufficient trustline on account {account_id}: {requested} requested, {available} available")]
    InsufficientTrustline {
        account_id: Uuid,
        requested: u64,
        available: i128,
    },
    #[error("account {account_id} has asset {current_code} at scale {current_scale}, cannot change it to {requested_code} at scale {requested_scale}")]
    AssetScaleMismatch {
        account_id: Uuid,
        current_code: String,
        current_scale: u8,
        requested_code: String,
        requested_scale: u8,
    },
    #[error("source and destination accounts are the same")]
    SameAccounts,
    #[error("amount overflows the balance of account {0}")]
    AmountOverflow(Uuid),
    #[error("transfer {transfer_id} settled partially: {committed} leg committed but {failed} leg failed: {reason}")]
    PartialSettlement {
        transfer_id: Uuid,
        committed: Leg,
        failed: Leg,
        reason: String,
    },
    #[error("ledger storage error: {0}")]
    Store(#[from] LedgerStoreError),
}

impl LedgerError {
    /// Fatal errors abort the packet in flight and need operator attention.
    /// Everything else is answered with an ordinary rejection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::PartialSettlement { .. } | LedgerError::Store(_)
        )
    }
}
