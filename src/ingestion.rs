use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::traits::CommandStream;
use crate::domain::{AccountId, Command, Error, Money};

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Self {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        Self { reader: Some(rdr) }
    }
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    op: String,
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    account: Option<u64>,
    #[serde(default)]
    to: Option<u64>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

fn required<T>(value: Option<T>, column: &str, op: &str) -> Result<T, Error> {
    value.ok_or_else(|| Error::Ingestion(format!("'{}' requires the {} column", op, column)))
}

fn text(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl TryFrom<CsvRow> for Command {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let op = row.op.trim().to_ascii_lowercase();
        let actor = text(row.actor);
        let name = text(row.name);
        let account = row.account.map(AccountId);
        let to = row.to.map(AccountId);
        let amount = || -> Result<Money, Error> {
            match text(row.amount.clone()) {
                Some(amount) => amount.parse(),
                None => Err(Error::InvalidAmount(format!("'{}' requires an amount", op))),
            }
        };

        let command = match op.as_str() {
            "register" => Command::Register {
                username: required(actor, "actor", &op)?,
                holder_name: required(name, "name", &op)?,
            },
            "admin" => Command::CreateAdmin {
                actor: required(actor, "actor", &op)?,
                username: required(name, "name", &op)?,
            },
            "deposit" => Command::Deposit {
                actor: required(actor, "actor", &op)?,
                account: required(account, "account", &op)?,
                amount: amount()?,
            },
            "withdraw" | "withdrawal" => Command::Withdraw {
                actor: required(actor, "actor", &op)?,
                account: required(account, "account", &op)?,
                amount: amount()?,
            },
            "transfer" => Command::Transfer {
                actor: required(actor, "actor", &op)?,
                from: required(account, "account", &op)?,
                to: required(to, "to", &op)?,
                amount: amount()?,
            },
            "status" => Command::SetStatus {
                actor: required(actor, "actor", &op)?,
                account: required(account, "account", &op)?,
                status: required(name, "name", &op)?.parse()?,
            },
            "delete" => Command::Delete {
                actor: required(actor, "actor", &op)?,
                account: required(account, "account", &op)?,
            },
            "statement" => Command::Statement {
                actor: required(actor, "actor", &op)?,
                account: required(account, "account", &op)?,
            },
            other => {
                return Err(Error::Ingestion(format!("Invalid operation: {}", other)));
            }
        };
        Ok(command)
    }
}

impl<R: Read + Send + 'static> CommandStream for CsvReader<R> {
    type Commands = Pin<Box<dyn Stream<Item = Result<Command, Error>> + Send>>;

    fn stream(&mut self) -> Self::Commands {
        let reader = match self.reader.take() {
            Some(r) => r,
            None => {
                return Box::pin(stream::iter(Vec::<Result<Command, Error>>::new()));
            }
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .map(|row_res| match row_res {
                Ok(row) => Command::try_from(row),
                Err(e) => Err(Error::Ingestion(format!(
                    "CSV deserialization error: {}",
                    e
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}
