//! # ilp-ledger
//!
//! Scale-aware, double-entry accounting for the connector core.
//!
//! The [`Accountant`] holds value for in-flight packets as two-phase
//! reservations, posts them on fulfillment and releases them on rejection.
//! It is written against the abstract [`LedgerStore`]; an
//! [`InMemoryLedgerStore`] is provided for single-process use and tests.

mod account;
mod accountant;
pub mod asset;
mod reservation;
mod store;
mod trustline;

/// Accounts are identified by UUID, as elsewhere in the connector
pub type AccountId = uuid::Uuid;

pub use self::account::{Account, AccountSettings, CreditLine};
pub use self::accountant::{Accountant, MAX_SUB_ACCOUNT_DEPTH};
pub use self::asset::{normalize, normalize_with_remainder, Normalized};
pub use self::reservation::{
    Direction, Reservation, ReservationState, RoundingLoss, Transfer, TransferRequest,
};
pub use self::store::{InMemoryLedgerStore, LedgerBatch, LedgerStore};
pub use self::trustline::TrustlineOperation;
