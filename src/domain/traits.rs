use std::future::Future;

use futures::Stream;
use rust_decimal::Decimal;

use crate::domain::{
    Account, AccountId, AccountStatus, Command, EntryId, Error, LedgerEntry, NewEntry, Totals,
    User, UserId,
};

pub trait CommandStream {
    type Commands: Stream<Item = Result<Command, Error>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::Commands;
}

pub trait DeadLetterQueue {
    fn report(&self, command: Option<&Command>, error: &Error);
}

/// Authoritative current balances and account lifecycle.
pub trait AccountStore: Send + Sync {
    fn get_account(&self, id: AccountId) -> impl Future<Output = Result<Account, Error>> + Send;

    fn get_balance(&self, id: AccountId) -> impl Future<Output = Result<Decimal, Error>> + Send;

    /// Applies `delta` on its own unit of work and returns the new balance.
    /// A negative delta that would take the balance below zero fails with
    /// `InsufficientFunds` and changes nothing.
    fn adjust_balance(
        &self,
        id: AccountId,
        delta: Decimal,
    ) -> impl Future<Output = Result<Decimal, Error>> + Send;

    fn set_status(
        &self,
        id: AccountId,
        status: AccountStatus,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn create_account(
        &self,
        holder_name: &str,
        owner: UserId,
    ) -> impl Future<Output = Result<AccountId, Error>> + Send;

    /// Removes the account for good. Ledger entries referencing it stay.
    fn delete_account(&self, id: AccountId) -> impl Future<Output = Result<(), Error>> + Send;

    fn list_accounts(&self) -> impl Future<Output = Result<Vec<Account>, Error>> + Send;

    /// Sum of every balance, read while all accounts are locked.
    fn total_balance(&self) -> impl Future<Output = Result<Decimal, Error>> + Send;
}

/// Append-only transaction log.
pub trait Ledger: Send + Sync {
    /// Writes the entry as is. Balance checks belong to the caller.
    fn append(&self, entry: NewEntry) -> impl Future<Output = Result<EntryId, Error>> + Send;

    /// Entries where the account is source or destination, newest first.
    fn history(
        &self,
        account: AccountId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, Error>> + Send;

    fn aggregate(&self, account: AccountId) -> impl Future<Output = Result<Totals, Error>> + Send;
}

pub trait UserDirectory: Send + Sync {
    /// Creates a customer and their account in one step.
    fn register(
        &self,
        username: &str,
        holder_name: &str,
    ) -> impl Future<Output = Result<(UserId, AccountId), Error>> + Send;

    fn create_admin(&self, username: &str) -> impl Future<Output = Result<UserId, Error>> + Send;

    fn find_user(&self, username: &str) -> impl Future<Output = Result<User, Error>> + Send;

    fn get_user(&self, id: UserId) -> impl Future<Output = Result<User, Error>> + Send;

    fn is_admin(&self, id: UserId) -> impl Future<Output = Result<bool, Error>> + Send;
}

/// Reads and staged writes over a locked set of accounts.
///
/// Nothing is visible to other callers until [`UnitOfWork::commit`]; dropping
/// the unit rolls everything back and releases the locks.
pub trait UnitOfWork: Send {
    fn exists(&self, id: AccountId) -> bool;

    /// Balance including the changes staged so far.
    fn balance(&self, id: AccountId) -> Result<Decimal, Error>;

    fn adjust_balance(&mut self, id: AccountId, delta: Decimal) -> Result<Decimal, Error>;

    fn append(&mut self, entry: NewEntry);

    /// Returns the ids of the appended entries, in append order.
    fn commit(self) -> impl Future<Output = Result<Vec<EntryId>, Error>> + Send;

    fn rollback(self)
    where
        Self: Sized,
    {
    }
}

pub trait Transactional: Send + Sync {
    type Unit: UnitOfWork;

    /// Locks the listed accounts in ascending id order. Ids that do not exist
    /// are skipped and report `NotFound` from the unit.
    fn begin(&self, accounts: &[AccountId]) -> impl Future<Output = Result<Self::Unit, Error>> + Send;
}

pub trait Store: AccountStore + Ledger + UserDirectory + Transactional {}

impl<T> Store for T where T: AccountStore + Ledger + UserDirectory + Transactional {}
