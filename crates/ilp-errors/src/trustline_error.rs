use crate::LedgerStoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errors for trustline operations between parent and child accounts
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrustlineError {
    #[error("account {0} does not exist")]
    UnknownAccount(Uuid),
    #[error("account {0} has no parent account")]
    UnknownSuperAccount(Uuid),
    #[error("account {0} has no trustline for this operation")]
    UnknownTrustline(Uuid),
    #[error("insufficient balance for trustline operation on account {0}")]
    InsufficientBalance(Uuid),
    #[error("account {0} is nested deeper than the maximum sub-account depth")]
    MaxDepthExceeded(Uuid),
    #[error("amount overflows the balance of account {0}")]
    AmountOverflow(Uuid),
    #[error("ledger storage error: {0}")]
    Store(#[from] LedgerStoreError),
}
