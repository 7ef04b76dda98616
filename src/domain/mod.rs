pub mod account;
pub mod command;
pub mod error;
pub mod money;
pub mod traits;
pub mod transaction;
pub mod user;

pub use account::{Account, AccountId, AccountStatus};
pub use command::Command;
pub use error::{Error, Missing};
pub use money::Money;
pub use traits::{
    AccountStore, CommandStream, DeadLetterQueue, Ledger, Store, Transactional, UnitOfWork,
    UserDirectory,
};
pub use transaction::{EntryId, LedgerEntry, NewEntry, Statement, Totals, TransactionKind};
pub use user::{Caller, Role, User, UserId};
