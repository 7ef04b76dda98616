use rust_decimal::Decimal;

use crate::domain::{
    Account, AccountId, AccountStatus, AccountStore, Caller, EntryId, Error, Ledger, Missing,
    Money, NewEntry, Statement, Store, Transactional, UnitOfWork, User, UserDirectory, UserId,
};

/// Outcome of a committed money movement.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub entry_id: EntryId,
    pub account_id: AccountId,
    pub balance: Decimal,
    /// Credited account and its new balance, for transfers.
    pub destination: Option<(AccountId, Decimal)>,
}

#[derive(Debug)]
pub struct Bank<S>
where
    S: Store,
{
    store: S,
}

impl<S> Bank<S>
where
    S: Store,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolves an authenticated user into a [`Caller`], evaluating the admin
    /// predicate up front.
    pub async fn caller(&self, user_id: UserId) -> Result<Caller, Error> {
        let user = self.store.get_user(user_id).await.map_err(|e| match e {
            Error::NotFound(_) => Error::Unauthorized(format!("unknown user {}", user_id)),
            other => other,
        })?;
        Ok(Caller {
            user_id,
            is_admin: user.is_admin(),
        })
    }

    pub async fn caller_by_username(&self, username: &str) -> Result<Caller, Error> {
        let user = self.store.find_user(username).await.map_err(|e| match e {
            Error::NotFound(_) => Error::Unauthorized(format!("unknown user '{}'", username)),
            other => other,
        })?;
        Ok(Caller {
            user_id: user.id,
            is_admin: user.is_admin(),
        })
    }

    pub async fn register(
        &self,
        username: &str,
        holder_name: &str,
    ) -> Result<(UserId, AccountId), Error> {
        let (user_id, account_id) = self.store.register(username, holder_name).await?;
        tracing::info!(%user_id, %account_id, username, "user registered");
        Ok((user_id, account_id))
    }

    pub async fn create_admin(&self, caller: &Caller, username: &str) -> Result<UserId, Error> {
        Self::require_admin(caller, "create administrators")?;
        let user_id = self.store.create_admin(username).await?;
        tracing::info!(%user_id, username, created_by = %caller.user_id, "administrator created");
        Ok(user_id)
    }

    pub async fn profile(&self, user_id: UserId) -> Result<User, Error> {
        self.store.get_user(user_id).await
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account, Error> {
        self.store.get_account(account_id).await
    }

    pub async fn balance(&self, account_id: AccountId) -> Result<Decimal, Error> {
        self.store.get_balance(account_id).await
    }

    pub async fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<Receipt, Error> {
        let amount = Money::try_from(amount)?;

        let mut unit = self.store.begin(&[account_id]).await?;
        if !unit.exists(account_id) {
            return Err(Error::NotFound(Missing::Account(account_id)));
        }
        let balance = unit.adjust_balance(account_id, amount.as_decimal())?;
        unit.append(NewEntry::deposit(account_id, amount));
        let entry_id = Self::single_entry(unit.commit().await?)?;

        tracing::debug!(%account_id, %amount, %balance, "deposit committed");
        Ok(Receipt {
            entry_id,
            account_id,
            balance,
            destination: None,
        })
    }

    pub async fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<Receipt, Error> {
        let amount = Money::try_from(amount)?;

        let mut unit = self.store.begin(&[account_id]).await?;
        let current = unit.balance(account_id)?;
        if amount.as_decimal() > current {
            return Err(Error::InsufficientFunds {
                account: account_id,
                balance: current,
                requested: amount.as_decimal(),
            });
        }
        let balance = unit.adjust_balance(account_id, -amount.as_decimal())?;
        unit.append(NewEntry::withdrawal(account_id, amount));
        let entry_id = Self::single_entry(unit.commit().await?)?;

        tracing::debug!(%account_id, %amount, %balance, "withdrawal committed");
        Ok(Receipt {
            entry_id,
            account_id,
            balance,
            destination: None,
        })
    }

    /// Moves `amount` from `source` to `destination` as a single ledger entry.
    ///
    /// Both accounts are locked for the whole unit. The destination is checked
    /// before anything is debited.
    pub async fn transfer(
        &self,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
    ) -> Result<Receipt, Error> {
        let amount = Money::try_from(amount)?;
        if source == destination {
            return Err(Error::InvalidOperation(format!(
                "cannot transfer from account {} to itself",
                source
            )));
        }

        let mut unit = self.store.begin(&[source, destination]).await?;
        let current = unit.balance(source)?;
        if amount.as_decimal() > current {
            return Err(Error::InsufficientFunds {
                account: source,
                balance: current,
                requested: amount.as_decimal(),
            });
        }
        if !unit.exists(destination) {
            return Err(Error::NotFound(Missing::Destination(destination)));
        }

        let balance = unit.adjust_balance(source, -amount.as_decimal())?;
        let credited = unit.adjust_balance(destination, amount.as_decimal())?;
        unit.append(NewEntry::transfer(source, destination, amount));
        let entry_id = Self::single_entry(unit.commit().await?)?;

        tracing::debug!(%source, %destination, %amount, "transfer committed");
        Ok(Receipt {
            entry_id,
            account_id: source,
            balance,
            destination: Some((destination, credited)),
        })
    }

    /// Balance and ledger read under the account lock, so they agree.
    pub async fn statement(&self, account_id: AccountId) -> Result<Statement, Error> {
        let unit = self.store.begin(&[account_id]).await?;
        let balance = unit.balance(account_id)?;
        let totals = self.store.aggregate(account_id).await?;
        let entries = self.store.history(account_id).await?;
        unit.rollback();

        Ok(Statement {
            account_id,
            balance,
            totals,
            entries,
        })
    }

    pub async fn set_status(
        &self,
        caller: &Caller,
        account_id: AccountId,
        status: AccountStatus,
    ) -> Result<(), Error> {
        Self::require_admin(caller, "change account status")?;
        self.store.set_status(account_id, status).await?;
        tracing::info!(%account_id, %status, by = %caller.user_id, "account status changed");
        Ok(())
    }

    /// Ledger entries that reference the account are kept.
    pub async fn delete_account(&self, caller: &Caller, account_id: AccountId) -> Result<(), Error> {
        Self::require_admin(caller, "delete accounts")?;
        self.store.delete_account(account_id).await?;
        tracing::info!(%account_id, by = %caller.user_id, "account deleted");
        Ok(())
    }

    pub async fn list_accounts(&self, caller: &Caller) -> Result<Vec<Account>, Error> {
        Self::require_admin(caller, "list all accounts")?;
        self.store.list_accounts().await
    }

    fn require_admin(caller: &Caller, action: &'static str) -> Result<(), Error> {
        if caller.is_admin {
            Ok(())
        } else {
            Err(Error::Forbidden {
                user: caller.user_id,
                action,
            })
        }
    }

    fn single_entry(ids: Vec<EntryId>) -> Result<EntryId, Error> {
        ids.into_iter().next().ok_or_else(|| {
            Error::StoreUnavailable("commit did not report the ledger entry".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::TransactionKind;
    use crate::memory_store::MemoryStore;

    async fn bank_with(names: &[&str]) -> (Bank<MemoryStore>, Vec<AccountId>) {
        let bank = Bank::new(MemoryStore::default());
        let mut accounts = Vec::new();
        for name in names {
            let (_, account) = bank.register(name, name).await.unwrap();
            accounts.push(account);
        }
        (bank, accounts)
    }

    #[tokio::test]
    async fn statement_scenario() {
        let (bank, accounts) = bank_with(&["a", "b"]).await;
        let (a, b) = (accounts[0], accounts[1]);
        bank.deposit(a, dec!(100.00)).await.unwrap();

        let receipt = bank.deposit(a, dec!(50.00)).await.unwrap();
        assert_eq!(receipt.balance, dec!(150.00));
        let history = bank.store().history(a).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Deposit);
        assert_eq!(history[0].amount, dec!(50.00));

        let err = bank.withdraw(a, dec!(200.00)).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(bank.balance(a).await.unwrap(), dec!(150.00));
        assert_eq!(bank.store().history(a).await.unwrap().len(), 2);

        let receipt = bank.transfer(a, b, dec!(100.00)).await.unwrap();
        assert_eq!(receipt.balance, dec!(50.00));
        assert_eq!(receipt.destination, Some((b, dec!(100.00))));

        let statement_a = bank.statement(a).await.unwrap();
        assert_eq!(statement_a.balance, dec!(50.00));
        assert_eq!(statement_a.totals.total_deposits, dec!(150.00));
        assert_eq!(statement_a.totals.total_transfers_out, dec!(-100.00));
        assert_eq!(statement_a.totals.total_transfers_in, Decimal::ZERO);
        let transfer = &statement_a.entries[0];
        assert_eq!(transfer.kind, TransactionKind::Transfer);
        assert_eq!(transfer.account_id, a);
        assert_eq!(transfer.destination_account_id, Some(b));
        assert_eq!(transfer.amount, dec!(-100.00));

        let statement_b = bank.statement(b).await.unwrap();
        assert_eq!(statement_b.balance, dec!(100.00));
        assert_eq!(statement_b.totals.total_transfers_in, dec!(100.00));
        assert_eq!(statement_b.totals.total_transfers_out, Decimal::ZERO);
        assert_eq!(statement_b.totals.total_deposits, Decimal::ZERO);
        assert_eq!(statement_b.entries.len(), 1);
        assert_eq!(statement_b.entries[0].id, transfer.id);
    }

    #[tokio::test]
    async fn invalid_amounts_are_rejected_first() {
        let (bank, accounts) = bank_with(&["a"]).await;
        for amount in [dec!(0), dec!(-1), dec!(0.004)] {
            assert!(matches!(
                bank.deposit(accounts[0], amount).await,
                Err(Error::InvalidAmount(_))
            ));
            assert!(matches!(
                bank.withdraw(AccountId(42), amount).await,
                Err(Error::InvalidAmount(_))
            ));
        }
        assert!(bank.store().history(accounts[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_accounts() {
        let (bank, accounts) = bank_with(&["a"]).await;
        let a = accounts[0];
        bank.deposit(a, dec!(10)).await.unwrap();

        assert!(matches!(
            bank.deposit(AccountId(9), dec!(1)).await,
            Err(Error::NotFound(Missing::Account(AccountId(9))))
        ));
        assert!(matches!(
            bank.withdraw(AccountId(9), dec!(1)).await,
            Err(Error::NotFound(Missing::Account(AccountId(9))))
        ));
        assert!(matches!(
            bank.transfer(AccountId(9), a, dec!(1)).await,
            Err(Error::NotFound(Missing::Account(AccountId(9))))
        ));
        assert!(matches!(
            bank.transfer(a, AccountId(9), dec!(1)).await,
            Err(Error::NotFound(Missing::Destination(AccountId(9))))
        ));
        assert!(matches!(
            bank.statement(AccountId(9)).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(bank.balance(a).await.unwrap(), dec!(10));
        assert_eq!(bank.store().history(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insufficient_transfer_changes_nothing() {
        let (bank, accounts) = bank_with(&["a", "b"]).await;
        let (a, b) = (accounts[0], accounts[1]);
        bank.deposit(a, dec!(20)).await.unwrap();

        assert!(matches!(
            bank.transfer(a, b, dec!(20.01)).await,
            Err(Error::InsufficientFunds { .. })
        ));
        assert_eq!(bank.balance(a).await.unwrap(), dec!(20));
        assert_eq!(bank.balance(b).await.unwrap(), Decimal::ZERO);
        assert!(bank.store().history(b).await.unwrap().is_empty());

        // the whole balance may leave
        bank.transfer(a, b, dec!(20)).await.unwrap();
        assert_eq!(bank.balance(a).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn self_transfer_is_refused() {
        let (bank, accounts) = bank_with(&["a"]).await;
        let a = accounts[0];
        bank.deposit(a, dec!(5)).await.unwrap();
        assert!(matches!(
            bank.transfer(a, a, dec!(1)).await,
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(bank.store().history(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn huge_amounts_fail_instead_of_overflowing() {
        let (bank, accounts) = bank_with(&["a", "b"]).await;
        let (a, b) = (accounts[0], accounts[1]);
        let max = Decimal::MAX.trunc();

        bank.deposit(a, max).await.unwrap();
        assert!(matches!(
            bank.deposit(a, dec!(1)).await,
            Err(Error::InvalidAmount(_))
        ));
        assert_eq!(bank.balance(a).await.unwrap(), max);
        assert_eq!(bank.store().history(a).await.unwrap().len(), 1);

        bank.deposit(b, dec!(1)).await.unwrap();
        assert!(matches!(
            bank.transfer(b, a, dec!(1)).await,
            Err(Error::InvalidAmount(_))
        ));
        assert_eq!(bank.balance(b).await.unwrap(), dec!(1));

        bank.withdraw(a, max).await.unwrap();
        bank.deposit(a, max).await.unwrap();
        assert!(matches!(
            bank.statement(a).await,
            Err(Error::InvalidAmount(_))
        ));
        assert_eq!(bank.balance(a).await.unwrap(), max);
    }

    #[tokio::test]
    async fn aggregates_default_to_zero() {
        let (bank, accounts) = bank_with(&["a"]).await;
        let statement = bank.statement(accounts[0]).await.unwrap();
        assert_eq!(statement.balance, Decimal::ZERO);
        assert_eq!(statement.totals, Default::default());
        assert!(statement.entries.is_empty());
    }

    #[tokio::test]
    async fn admin_operations_need_an_admin() {
        let (bank, accounts) = bank_with(&["a", "b"]).await;
        let a = accounts[0];
        let customer = bank.caller_by_username("a").await.unwrap();
        assert!(!customer.is_admin);

        assert!(matches!(
            bank.set_status(&customer, a, AccountStatus::Inactive).await,
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            bank.delete_account(&customer, a).await,
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            bank.list_accounts(&customer).await,
            Err(Error::Forbidden { .. })
        ));
        assert!(matches!(
            bank.create_admin(&customer, "mallory").await,
            Err(Error::Forbidden { .. })
        ));

        let root = bank.store().create_admin("root").await.unwrap();
        let admin = bank.caller(root).await.unwrap();
        assert!(admin.is_admin);
        bank.set_status(&admin, a, AccountStatus::Inactive).await.unwrap();
        assert_eq!(bank.account(a).await.unwrap().status, AccountStatus::Inactive);
        assert_eq!(bank.list_accounts(&admin).await.unwrap().len(), 2);

        assert!(matches!(
            bank.caller(UserId(404)).await,
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            bank.caller_by_username("ghost").await,
            Err(Error::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn deleted_account_keeps_counterparty_history() {
        let (bank, accounts) = bank_with(&["a", "b"]).await;
        let (a, b) = (accounts[0], accounts[1]);
        let root = bank.store().create_admin("root").await.unwrap();
        let admin = bank.caller(root).await.unwrap();

        bank.deposit(a, dec!(30)).await.unwrap();
        bank.transfer(a, b, dec!(30)).await.unwrap();
        bank.delete_account(&admin, a).await.unwrap();

        assert!(matches!(bank.account(a).await, Err(Error::NotFound(_))));
        assert!(matches!(
            bank.transfer(b, a, dec!(1)).await,
            Err(Error::NotFound(Missing::Destination(_)))
        ));
        let statement = bank.statement(b).await.unwrap();
        assert_eq!(statement.totals.total_transfers_in, dec!(30));
        assert_eq!(statement.entries[0].account_id, a);
        assert_eq!(bank.store().total_balance().await.unwrap(), dec!(30));
    }

    #[tokio::test]
    async fn inactive_accounts_still_move_money() {
        let (bank, accounts) = bank_with(&["a"]).await;
        let a = accounts[0];
        bank.store().set_status(a, AccountStatus::Inactive).await.unwrap();
        bank.deposit(a, dec!(1)).await.unwrap();
        assert_eq!(bank.balance(a).await.unwrap(), dec!(1));
    }

    #[tokio::test]
    async fn profile_reports_creation_time() {
        let bank = Bank::new(MemoryStore::default());
        let (user, _) = bank.register("ana", "Ana").await.unwrap();
        let profile = bank.profile(user).await.unwrap();
        assert_eq!(profile.username, "ana");
        assert!(profile.created_at <= chrono::Utc::now());
    }
}
