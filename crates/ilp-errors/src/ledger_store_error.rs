use std::error::Error as StdError;
use thiserror::Error;

/// Errors raised by the durable storage behind the accountant
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LedgerStoreError {
    #[error("ledger record {0} is missing from storage")]
    MissingRecord(String),
    #[error("{0}")]
    Other(#[from] Box<dyn StdError + Send + Sync + 'static>),
}

impl LedgerStoreError {
    pub fn other<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        LedgerStoreError::Other(Box::new(err))
    }
}

impl From<std::io::Error> for LedgerStoreError {
    fn from(src: std::io::Error) -> LedgerStoreError {
        LedgerStoreError::other(src)
    }
}
