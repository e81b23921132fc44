use crate::AccountId;
use serde::{Deserialize, Serialize};

/// How far below zero an account's balance may go.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditLine {
    Limited(u64),
    Unlimited,
}

impl CreditLine {
    /// The lowest balance the account may reach, or `None` if it is unbounded.
    pub fn floor(&self) -> Option<i128> {
        match self {
            CreditLine::Limited(limit) => Some(-i128::from(*limit)),
            CreditLine::Unlimited => None,
        }
    }
}

impl From<Option<u64>> for CreditLine {
    fn from(limit: Option<u64>) -> Self {
        match limit {
            Some(limit) => CreditLine::Limited(limit),
            None => CreditLine::Unlimited,
        }
    }
}

impl Default for CreditLine {
    fn default() -> Self {
        CreditLine::Limited(0)
    }
}

/// The settings an external collaborator supplies for an account.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AccountSettings {
    pub id: AccountId,
    pub asset_code: String,
    pub asset_scale: u8,
    #[serde(default)]
    pub credit_line: CreditLine,
    #[serde(default)]
    pub parent_account_id: Option<AccountId>,
    /// Cover debit shortfalls from credit extended by the parent account
    #[serde(default)]
    pub rollup: bool,
}

/// A ledger account in its own asset and scale.
///
/// `balance` is the posted balance: debits lower it, credits raise it. The
/// trustline invariant `balance >= -credit_line` holds for every stored
/// account. Open reservations are tracked alongside so that the available
/// view (`balance - pending_debits`) can be computed without scanning them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub asset_code: String,
    pub asset_scale: u8,
    pub balance: i64,
    pub credit_line: CreditLine,
    pub parent_account_id: Option<AccountId>,
    pub rollup: bool,
    /// Sum of open debit reservations held on this account
    pub pending_debits: u64,
    /// Sum of open credit reservations waiting to be posted
    pub pending_credits: u64,
    /// Credit extended by the parent and not yet utilized
    pub trustline_available: u64,
    /// Part of `trustline_available` held by open rollup reservations
    pub pending_drawn: u64,
    /// Utilized trustline not yet settled back to the parent
    pub borrowed: u64,
    /// Amount sub-accounts have utilized from this account's credit
    pub lent: u64,
    /// Credit this account extended to its sub-accounts and that is not yet
    /// utilized
    pub credit_extended: u64,
}

impl Account {
    pub fn new(settings: AccountSettings) -> Self {
        Account {
            id: settings.id,
            asset_code: settings.asset_code,
            asset_scale: settings.asset_scale,
            balance: 0,
            credit_line: settings.credit_line,
            parent_account_id: settings.parent_account_id,
            rollup: settings.rollup,
            pending_debits: 0,
            pending_credits: 0,
            trustline_available: 0,
            pending_drawn: 0,
            borrowed: 0,
            lent: 0,
            credit_extended: 0,
        }
    }

    /// Posted balance minus open debit reservations
    pub fn available(&self) -> i128 {
        i128::from(self.balance) - i128::from(self.pending_debits)
    }

    /// How much more could be debited before the balance would fall below
    /// the credit line. `None` if the credit line is unlimited.
    pub fn headroom(&self) -> Option<i128> {
        self.credit_line
            .floor()
            .map(|floor| (self.available() - floor).max(0))
    }

    /// Parent-extended credit that a new rollup reservation could still draw.
    pub fn undrawn_trustline(&self) -> u64 {
        self.trustline_available.saturating_sub(self.pending_drawn)
    }

    pub fn satisfies_trustline(&self) -> bool {
        match self.credit_line.floor() {
            Some(floor) => i128::from(self.balance) >= floor,
            None => true,
        }
    }

    pub(crate) fn settings_conflict(&self, settings: &AccountSettings) -> bool {
        self.asset_scale != settings.asset_scale || self.asset_code != settings.asset_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn account(credit_line: CreditLine) -> Account {
        Account::new(AccountSettings {
            id: Uuid::new_v4(),
            asset_code: "USD".to_string(),
            asset_scale: 2,
            credit_line,
            parent_account_id: None,
            rollup: false,
        })
    }

    #[test]
    fn headroom_accounts_for_pending_debits() {
        let mut account = account(CreditLine::Limited(100));
        assert_eq!(account.headroom(), Some(100));
        account.pending_debits = 40;
        assert_eq!(account.available(), -40);
        assert_eq!(account.headroom(), Some(60));
        account.balance = 50;
        assert_eq!(account.headroom(), Some(110));
    }

    #[test]
    fn unlimited_credit_has_no_headroom_bound() {
        let mut account = account(CreditLine::Unlimited);
        account.balance = -1_000_000;
        assert_eq!(account.headroom(), None);
        assert!(account.satisfies_trustline());
    }

    #[test]
    fn credit_line_from_config_option() {
        assert_eq!(CreditLine::from(Some(5)), CreditLine::Limited(5));
        assert_eq!(CreditLine::from(None), CreditLine::Unlimited);
    }
}
