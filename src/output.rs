use std::io::Write;

use serde::Serialize;

use crate::domain::{Account, AccountId, AccountStatus, Error, UserId};

#[derive(Debug, Serialize)]
struct AccountRow<'a> {
    account: AccountId,
    holder: &'a str,
    owner: UserId,
    balance: String,
    status: AccountStatus,
}

/// Writes `account,holder,owner,balance,status` rows, balances at two decimals.
pub fn write_accounts<W: Write>(output: W, accounts: &[Account]) -> Result<(), Error> {
    let mut writer = csv::Writer::from_writer(output);
    if accounts.is_empty() {
        // serialize only emits the header alongside a first record
        writer
            .write_record(["account", "holder", "owner", "balance", "status"])
            .map_err(|e| Error::Output(format!("Failed to write CSV: {}", e)))?;
    }
    for account in accounts {
        writer
            .serialize(AccountRow {
                account: account.id,
                holder: &account.holder_name,
                owner: account.owner_user_id,
                balance: format!("{:.2}", account.balance),
                status: account.status,
            })
            .map_err(|e| Error::Output(format!("Failed to write CSV: {}", e)))?;
    }
    writer.flush()?;
    Ok(())
}
