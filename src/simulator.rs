use std::io::Write;

use futures::StreamExt;

use crate::domain::{AccountStore, Command, CommandStream, DeadLetterQueue, Error, Store};
use crate::engine::Bank;
use crate::output::write_accounts;

/// Feeds a command stream through a [`Bank`], one command at a time.
#[derive(Debug)]
pub struct Simulator<I, S, D>
where
    I: CommandStream,
    S: Store,
    D: DeadLetterQueue,
{
    ingestion: I,
    bank: Bank<S>,
    dlq: D,
}

impl<I, S, D> Simulator<I, S, D>
where
    I: CommandStream,
    S: Store,
    D: DeadLetterQueue,
{
    pub fn new(ingestion: I, bank: Bank<S>, dlq: D) -> Self {
        Self {
            ingestion,
            bank,
            dlq,
        }
    }

    pub fn bank(&self) -> &Bank<S> {
        &self.bank
    }

    pub fn dlq(&self) -> &D {
        &self.dlq
    }

    pub async fn process(&mut self) -> Result<(), Error> {
        let mut commands = self.ingestion.stream();

        while let Some(command) = commands.next().await {
            match command {
                Ok(command) => match self.apply(&command).await {
                    Ok(()) => {}
                    Err(e) => self.dlq.report(Some(&command), &e),
                },
                Err(e) => self.dlq.report(None, &e),
            }
        }

        Ok(())
    }

    async fn apply(&self, command: &Command) -> Result<(), Error> {
        match command {
            Command::Register {
                username,
                holder_name,
            } => {
                self.bank.register(username, holder_name).await?;
            }
            Command::CreateAdmin { actor, username } => {
                let caller = self.bank.caller_by_username(actor).await?;
                self.bank.create_admin(&caller, username).await?;
            }
            Command::Deposit {
                actor,
                account,
                amount,
            } => {
                self.bank.caller_by_username(actor).await?;
                self.bank.deposit(*account, amount.as_decimal()).await?;
            }
            Command::Withdraw {
                actor,
                account,
                amount,
            } => {
                self.bank.caller_by_username(actor).await?;
                self.bank.withdraw(*account, amount.as_decimal()).await?;
            }
            Command::Transfer {
                actor,
                from,
                to,
                amount,
            } => {
                self.bank.caller_by_username(actor).await?;
                self.bank.transfer(*from, *to, amount.as_decimal()).await?;
            }
            Command::SetStatus {
                actor,
                account,
                status,
            } => {
                let caller = self.bank.caller_by_username(actor).await?;
                self.bank.set_status(&caller, *account, *status).await?;
            }
            Command::Delete { actor, account } => {
                let caller = self.bank.caller_by_username(actor).await?;
                self.bank.delete_account(&caller, *account).await?;
            }
            Command::Statement { actor, account } => {
                self.bank.caller_by_username(actor).await?;
                let statement = self.bank.statement(*account).await?;
                tracing::info!(
                    account = %statement.account_id,
                    balance = %statement.balance,
                    deposits = %statement.totals.total_deposits,
                    withdrawals = %statement.totals.total_withdrawals,
                    transfers_out = %statement.totals.total_transfers_out,
                    transfers_in = %statement.totals.total_transfers_in,
                    "statement"
                );
                for entry in &statement.entries {
                    tracing::info!("  {}", entry);
                }
            }
        }
        Ok(())
    }

    /// Writes every remaining account, ordered by id.
    pub async fn flush<W: Write>(&self, output: W) -> Result<(), Error> {
        let accounts = self.bank.store().list_accounts().await?;
        write_accounts(output, &accounts)
    }
}
