use rust_decimal::Decimal;

use crate::domain::{AccountId, UserId};

/// What a `NotFound` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Account(AccountId),
    Destination(AccountId),
    User(UserId),
    Username(String),
}

impl core::fmt::Display for Missing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Missing::Account(id) => write!(f, "account {}", id),
            Missing::Destination(id) => write!(f, "destination account {}", id),
            Missing::User(id) => write!(f, "user {}", id),
            Missing::Username(name) => write!(f, "user '{}'", name),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("Ingestion failed with: {0}")]
    Ingestion(String),

    #[error("Output failed with: {0}")]
    Output(String),

    #[error("{0} not found")]
    NotFound(Missing),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("User {user} is not allowed to {action}")]
    Forbidden { user: UserId, action: &'static str },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid account status '{0}', use 'active' or 'inactive'")]
    InvalidStatus(String),

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Timed out waiting for {0}")]
    Busy(String),
}

impl Error {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Busy(_) | Error::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(Error::Busy("account 1".into()).is_transient());
        assert!(Error::StoreUnavailable("closed".into()).is_transient());
        assert!(!Error::NotFound(Missing::Account(AccountId(1))).is_transient());
        assert!(!Error::InvalidAmount("0".into()).is_transient());
    }

    #[test]
    fn not_found_names_the_subject() {
        let err = Error::NotFound(Missing::Destination(AccountId(7)));
        assert_eq!(err.to_string(), "destination account 7 not found");
    }
}
