use crate::domain::{AccountId, AccountStatus, Money};

/// One step of a simulation script.
///
/// `actor` is the username of the already authenticated user issuing the
/// request.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Register {
        username: String,
        holder_name: String,
    },
    CreateAdmin {
        actor: String,
        username: String,
    },
    Deposit {
        actor: String,
        account: AccountId,
        amount: Money,
    },
    Withdraw {
        actor: String,
        account: AccountId,
        amount: Money,
    },
    Transfer {
        actor: String,
        from: AccountId,
        to: AccountId,
        amount: Money,
    },
    SetStatus {
        actor: String,
        account: AccountId,
        status: AccountStatus,
    },
    Delete {
        actor: String,
        account: AccountId,
    },
    Statement {
        actor: String,
        account: AccountId,
    },
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Command::Register {
                username,
                holder_name,
            } => write!(f, "register,user={},holder={}", username, holder_name),
            Command::CreateAdmin { actor, username } => {
                write!(f, "admin,actor={},user={}", actor, username)
            }
            Command::Deposit {
                actor,
                account,
                amount,
            } => write!(f, "deposit,actor={},account={},amount={}", actor, account, amount),
            Command::Withdraw {
                actor,
                account,
                amount,
            } => write!(f, "withdraw,actor={},account={},amount={}", actor, account, amount),
            Command::Transfer {
                actor,
                from,
                to,
                amount,
            } => write!(
                f,
                "transfer,actor={},from={},to={},amount={}",
                actor, from, to, amount
            ),
            Command::SetStatus {
                actor,
                account,
                status,
            } => write!(f, "status,actor={},account={},status={}", actor, account, status),
            Command::Delete { actor, account } => {
                write!(f, "delete,actor={},account={}", actor, account)
            }
            Command::Statement { actor, account } => {
                write!(f, "statement,actor={},account={}", actor, account)
            }
        }
    }
}
