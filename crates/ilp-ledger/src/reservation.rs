use crate::AccountId;
use ilp_errors::Leg;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Debit,
    Credit,
}

impl From<Direction> for Leg {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Debit => Leg::Debit,
            Direction::Credit => Leg::Credit,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Reserved,
    Committed,
    RolledBack,
}

/// A provisional balance adjustment. It moves to `Committed` or
/// `RolledBack` exactly once.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub account_id: AccountId,
    pub amount: u64,
    pub direction: Direction,
    pub state: ReservationState,
    /// The packet this reservation is one leg of, if any
    pub transfer_id: Option<Uuid>,
    /// Part of a debit covered by parent-extended credit
    pub drawn: u64,
    /// Ancestors of `account_id`, nearest first, touched when `drawn > 0`.
    /// The last one is the top-level account that funds the draw.
    pub rollup_chain: Vec<AccountId>,
}

impl Reservation {
    pub(crate) fn new(
        account_id: AccountId,
        amount: u64,
        direction: Direction,
        transfer_id: Option<Uuid>,
    ) -> Self {
        Reservation {
            id: Uuid::new_v4(),
            account_id,
            amount,
            direction,
            state: ReservationState::Reserved,
            transfer_id,
            drawn: 0,
            rollup_chain: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state != ReservationState::Reserved
    }

    /// Every account whose record changes when this reservation settles
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts = Vec::with_capacity(1 + self.rollup_chain.len());
        accounts.push(self.account_id);
        if self.drawn > 0 {
            accounts.extend(self.rollup_chain.iter().copied());
        }
        accounts
    }
}

/// Both legs of a packet's value movement across two accounts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub debit: Reservation,
    pub credit: Reservation,
}

impl Transfer {
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts = self.debit.accounts();
        accounts.extend(self.credit.accounts());
        accounts
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferRequest {
    pub transfer_id: Uuid,
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    /// In the source account's scale
    pub source_amount: u64,
    /// In the destination account's scale
    pub destination_amount: u64,
}

/// Value truncated away when a transfer was normalized to a smaller scale.
/// Recorded for reconciliation and never refunded.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoundingLoss {
    pub transfer_id: Uuid,
    /// The account whose scale the amount was normalized into
    pub account_id: AccountId,
    /// In `from_scale` units
    pub remainder: u64,
    pub from_scale: u8,
    pub to_scale: u8,
}
