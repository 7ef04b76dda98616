use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Error, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl core::fmt::Display for EntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
}

/// A ledger entry that has not been written yet.
///
/// The constructors fix the sign convention: deposits and withdrawals carry
/// the positive amount, a transfer carries the negated amount as seen from
/// the source account.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub account_id: AccountId,
    pub destination_account_id: Option<AccountId>,
}

impl NewEntry {
    pub fn deposit(account_id: AccountId, amount: Money) -> Self {
        Self {
            kind: TransactionKind::Deposit,
            amount: amount.as_decimal(),
            account_id,
            destination_account_id: None,
        }
    }

    pub fn withdrawal(account_id: AccountId, amount: Money) -> Self {
        Self {
            kind: TransactionKind::Withdrawal,
            amount: amount.as_decimal(),
            account_id,
            destination_account_id: None,
        }
    }

    pub fn transfer(source: AccountId, destination: AccountId, amount: Money) -> Self {
        Self {
            kind: TransactionKind::Transfer,
            amount: -amount.as_decimal(),
            account_id: source,
            destination_account_id: Some(destination),
        }
    }

    pub fn into_entry(self, id: EntryId, timestamp: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            kind: self.kind,
            amount: self.amount,
            account_id: self.account_id,
            destination_account_id: self.destination_account_id,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub account_id: AccountId,
    pub destination_account_id: Option<AccountId>,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn involves(&self, account: AccountId) -> bool {
        self.account_id == account || self.destination_account_id == Some(account)
    }
}

impl core::fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.destination_account_id {
            Some(destination) => write!(
                f,
                "#{} {:?},account={},destination={},amount={:.2},at={}",
                self.id,
                self.kind,
                self.account_id,
                destination,
                self.amount,
                self.timestamp.to_rfc3339()
            ),
            None => write!(
                f,
                "#{} {:?},account={},amount={:.2},at={}",
                self.id,
                self.kind,
                self.account_id,
                self.amount,
                self.timestamp.to_rfc3339()
            ),
        }
    }
}

/// Ledger-derived sums for one account.
///
/// `total_transfers_out` keeps the stored sign and is therefore never
/// positive; `total_transfers_in` is never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_transfers_out: Decimal,
    pub total_transfers_in: Decimal,
}

impl Totals {
    /// Folds one entry in. Fails instead of wrapping when a sum leaves the
    /// representable range.
    pub fn record(mut self, entry: &LedgerEntry, account: AccountId) -> Result<Self, Error> {
        match entry.kind {
            TransactionKind::Deposit if entry.account_id == account => {
                self.total_deposits = checked(self.total_deposits.checked_add(entry.amount))?;
            }
            TransactionKind::Withdrawal if entry.account_id == account => {
                self.total_withdrawals = checked(self.total_withdrawals.checked_add(entry.amount))?;
            }
            TransactionKind::Transfer => {
                if entry.account_id == account {
                    self.total_transfers_out =
                        checked(self.total_transfers_out.checked_add(entry.amount))?;
                }
                if entry.destination_account_id == Some(account) {
                    // stored negative from the source's side
                    self.total_transfers_in =
                        checked(self.total_transfers_in.checked_sub(entry.amount))?;
                }
            }
            _ => {}
        }
        Ok(self)
    }
}

fn checked(sum: Option<Decimal>) -> Result<Decimal, Error> {
    sum.ok_or_else(|| Error::InvalidAmount("ledger totals overflowed".to_string()))
}

/// Current balance plus everything the ledger knows about an account.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub account_id: AccountId,
    pub balance: Decimal,
    #[serde(flatten)]
    pub totals: Totals,
    pub entries: Vec<LedgerEntry>,
}
