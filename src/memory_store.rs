use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::config::Config;
use crate::domain::{
    Account, AccountId, AccountStatus, AccountStore, EntryId, Error, Ledger, LedgerEntry, Missing,
    NewEntry, Role, Totals, Transactional, UnitOfWork, User, UserDirectory, UserId,
};

/// `None` once the account has been deleted.
type AccountSlot = Arc<Mutex<Option<Account>>>;

async fn bounded<F: Future>(
    timeout: Duration,
    fut: F,
    what: impl FnOnce() -> String,
) -> Result<F::Output, Error> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Busy(what()))
}

#[derive(Debug, Default)]
struct Users {
    by_id: HashMap<UserId, User>,
    by_name: HashMap<String, UserId>,
    last_id: u64,
}

impl Users {
    fn insert(&mut self, username: &str, role: Role) -> UserId {
        self.last_id += 1;
        let id = UserId(self.last_id);
        self.by_id.insert(
            id,
            User {
                id,
                username: username.to_string(),
                role,
                created_at: Utc::now(),
            },
        );
        self.by_name.insert(username.to_string(), id);
        id
    }
}

/// In-process store: one mutex per account row, a shared append-only ledger.
#[derive(Debug)]
pub struct MemoryStore {
    accounts: RwLock<BTreeMap<AccountId, AccountSlot>>,
    users: RwLock<Users>,
    ledger: Arc<RwLock<Vec<LedgerEntry>>>,
    next_account_id: AtomicU64,
    available: Arc<AtomicBool>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            users: RwLock::new(Users::default()),
            ledger: Arc::new(RwLock::new(Vec::new())),
            next_account_id: AtomicU64::new(1),
            available: Arc::new(AtomicBool::new(true)),
            lock_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.lock_timeout)
    }

    /// Stops serving requests. Units already open fail on commit.
    pub fn shutdown(&self) {
        self.available.store(false, Ordering::SeqCst);
        tracing::info!("store shut down");
    }

    fn ensure_available(&self) -> Result<(), Error> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("store has been shut down".to_string()))
        }
    }

    async fn slot(&self, id: AccountId) -> Result<AccountSlot, Error> {
        let index = bounded(self.lock_timeout, self.accounts.read(), || {
            "the account index".to_string()
        })
        .await?;
        index
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(Missing::Account(id)))
    }

    async fn snapshot(&self) -> Result<Vec<(AccountId, AccountSlot)>, Error> {
        let index = bounded(self.lock_timeout, self.accounts.read(), || {
            "the account index".to_string()
        })
        .await?;
        Ok(index
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect())
    }
}

pub struct MemoryUnit {
    guards: BTreeMap<AccountId, OwnedMutexGuard<Option<Account>>>,
    staged: BTreeMap<AccountId, Decimal>,
    pending: Vec<NewEntry>,
    ledger: Arc<RwLock<Vec<LedgerEntry>>>,
    available: Arc<AtomicBool>,
    lock_timeout: Duration,
}

impl UnitOfWork for MemoryUnit {
    fn exists(&self, id: AccountId) -> bool {
        self.guards.get(&id).is_some_and(|guard| guard.is_some())
    }

    fn balance(&self, id: AccountId) -> Result<Decimal, Error> {
        if let Some(balance) = self.staged.get(&id) {
            return Ok(*balance);
        }
        self.guards
            .get(&id)
            .and_then(|guard| guard.as_ref())
            .map(|account| account.balance)
            .ok_or(Error::NotFound(Missing::Account(id)))
    }

    fn adjust_balance(&mut self, id: AccountId, delta: Decimal) -> Result<Decimal, Error> {
        let balance = self.balance(id)?;
        let next = balance.checked_add(delta).ok_or_else(|| {
            Error::InvalidAmount(format!("balance of account {} would overflow", id))
        })?;
        if delta < Decimal::ZERO && next < Decimal::ZERO {
            return Err(Error::InsufficientFunds {
                account: id,
                balance,
                requested: -delta,
            });
        }
        self.staged.insert(id, next);
        Ok(next)
    }

    fn append(&mut self, entry: NewEntry) {
        self.pending.push(entry);
    }

    async fn commit(mut self) -> Result<Vec<EntryId>, Error> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(
                "store shut down before commit".to_string(),
            ));
        }

        let mut ids = Vec::with_capacity(self.pending.len());
        if !self.pending.is_empty() {
            let mut ledger = bounded(self.lock_timeout, self.ledger.write(), || {
                "the ledger".to_string()
            })
            .await?;
            let timestamp = Utc::now();
            for entry in self.pending.drain(..) {
                let id = EntryId(ledger.len() as u64 + 1);
                ledger.push(entry.into_entry(id, timestamp));
                ids.push(id);
            }
        }

        for (id, balance) in std::mem::take(&mut self.staged) {
            if let Some(account) = self.guards.get_mut(&id).and_then(|guard| guard.as_mut()) {
                account.balance = balance;
            }
        }
        Ok(ids)
    }
}

impl Transactional for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self, accounts: &[AccountId]) -> Result<MemoryUnit, Error> {
        self.ensure_available()?;

        let mut ids = accounts.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let slots: Vec<(AccountId, AccountSlot)> = {
            let index = bounded(self.lock_timeout, self.accounts.read(), || {
                "the account index".to_string()
            })
            .await?;
            ids.iter()
                .filter_map(|id| index.get(id).map(|slot| (*id, Arc::clone(slot))))
                .collect()
        };

        // ascending id order, so two units can never wait on each other
        let mut guards = BTreeMap::new();
        for (id, slot) in slots {
            let guard = bounded(self.lock_timeout, slot.lock_owned(), || {
                format!("a lock on account {}", id)
            })
            .await?;
            if guard.is_some() {
                guards.insert(id, guard);
            }
        }
        tracing::trace!(?ids, locked = guards.len(), "unit of work started");

        Ok(MemoryUnit {
            guards,
            staged: BTreeMap::new(),
            pending: Vec::new(),
            ledger: Arc::clone(&self.ledger),
            available: Arc::clone(&self.available),
            lock_timeout: self.lock_timeout,
        })
    }
}

impl AccountStore for MemoryStore {
    async fn get_account(&self, id: AccountId) -> Result<Account, Error> {
        self.ensure_available()?;
        let slot = self.slot(id).await?;
        let guard = bounded(self.lock_timeout, slot.lock(), || {
            format!("a lock on account {}", id)
        })
        .await?;
        guard.clone().ok_or(Error::NotFound(Missing::Account(id)))
    }

    async fn get_balance(&self, id: AccountId) -> Result<Decimal, Error> {
        Ok(self.get_account(id).await?.balance)
    }

    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Decimal, Error> {
        let mut unit = self.begin(&[id]).await?;
        let balance = unit.adjust_balance(id, delta)?;
        unit.commit().await?;
        Ok(balance)
    }

    async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<(), Error> {
        self.ensure_available()?;
        let slot = self.slot(id).await?;
        let mut guard = bounded(self.lock_timeout, slot.lock(), || {
            format!("a lock on account {}", id)
        })
        .await?;
        let account = guard
            .as_mut()
            .ok_or(Error::NotFound(Missing::Account(id)))?;
        account.status = status;
        Ok(())
    }

    async fn create_account(&self, holder_name: &str, owner: UserId) -> Result<AccountId, Error> {
        self.ensure_available()?;
        let mut index = bounded(self.lock_timeout, self.accounts.write(), || {
            "the account index".to_string()
        })
        .await?;
        let id = AccountId(self.next_account_id.fetch_add(1, Ordering::SeqCst));
        index.insert(
            id,
            Arc::new(Mutex::new(Some(Account::new(id, holder_name, owner)))),
        );
        Ok(id)
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), Error> {
        self.ensure_available()?;
        let slot = self.slot(id).await?;
        let mut guard = bounded(self.lock_timeout, slot.lock(), || {
            format!("a lock on account {}", id)
        })
        .await?;
        if guard.is_none() {
            return Err(Error::NotFound(Missing::Account(id)));
        }
        // row stays intact until the index can drop it too
        let mut index = bounded(self.lock_timeout, self.accounts.write(), || {
            "the account index".to_string()
        })
        .await?;
        guard.take();
        index.remove(&id);
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, Error> {
        self.ensure_available()?;
        let mut accounts = Vec::new();
        for (id, slot) in self.snapshot().await? {
            let guard = bounded(self.lock_timeout, slot.lock(), || {
                format!("a lock on account {}", id)
            })
            .await?;
            if let Some(account) = guard.as_ref() {
                accounts.push(account.clone());
            }
        }
        Ok(accounts)
    }

    async fn total_balance(&self) -> Result<Decimal, Error> {
        self.ensure_available()?;
        let slots = self.snapshot().await?;
        let mut guards = Vec::with_capacity(slots.len());
        for (id, slot) in &slots {
            guards.push(
                bounded(self.lock_timeout, slot.lock(), || {
                    format!("a lock on account {}", id)
                })
                .await?,
            );
        }
        guards
            .iter()
            .filter_map(|guard| guard.as_ref())
            .try_fold(Decimal::ZERO, |total, account| total.checked_add(account.balance))
            .ok_or_else(|| Error::InvalidAmount("total balance overflowed".to_string()))
    }
}

impl Ledger for MemoryStore {
    async fn append(&self, entry: NewEntry) -> Result<EntryId, Error> {
        self.ensure_available()?;
        let mut ledger = bounded(self.lock_timeout, self.ledger.write(), || {
            "the ledger".to_string()
        })
        .await?;
        let id = EntryId(ledger.len() as u64 + 1);
        ledger.push(entry.into_entry(id, Utc::now()));
        Ok(id)
    }

    async fn history(&self, account: AccountId) -> Result<Vec<LedgerEntry>, Error> {
        self.ensure_available()?;
        let ledger = bounded(self.lock_timeout, self.ledger.read(), || {
            "the ledger".to_string()
        })
        .await?;
        let mut entries: Vec<LedgerEntry> = ledger
            .iter()
            .rev()
            .filter(|entry| entry.involves(account))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn aggregate(&self, account: AccountId) -> Result<Totals, Error> {
        self.ensure_available()?;
        let ledger = bounded(self.lock_timeout, self.ledger.read(), || {
            "the ledger".to_string()
        })
        .await?;
        ledger
            .iter()
            .try_fold(Totals::default(), |totals, entry| totals.record(entry, account))
    }
}

impl UserDirectory for MemoryStore {
    async fn register(&self, username: &str, holder_name: &str) -> Result<(UserId, AccountId), Error> {
        self.ensure_available()?;
        let username = username.trim();
        let holder_name = holder_name.trim();
        if username.is_empty() || holder_name.is_empty() {
            return Err(Error::InvalidOperation(
                "username and holder name are required".to_string(),
            ));
        }

        let mut users = bounded(self.lock_timeout, self.users.write(), || {
            "the user directory".to_string()
        })
        .await?;
        if users.by_name.contains_key(username) {
            return Err(Error::UsernameTaken(username.to_string()));
        }
        let mut index = bounded(self.lock_timeout, self.accounts.write(), || {
            "the account index".to_string()
        })
        .await?;

        let user_id = users.insert(username, Role::Customer);
        let account_id = AccountId(self.next_account_id.fetch_add(1, Ordering::SeqCst));
        index.insert(
            account_id,
            Arc::new(Mutex::new(Some(Account::new(
                account_id,
                holder_name,
                user_id,
            )))),
        );
        Ok((user_id, account_id))
    }

    async fn create_admin(&self, username: &str) -> Result<UserId, Error> {
        self.ensure_available()?;
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::InvalidOperation("username is required".to_string()));
        }
        let mut users = bounded(self.lock_timeout, self.users.write(), || {
            "the user directory".to_string()
        })
        .await?;
        if users.by_name.contains_key(username) {
            return Err(Error::UsernameTaken(username.to_string()));
        }
        Ok(users.insert(username, Role::Admin))
    }

    async fn find_user(&self, username: &str) -> Result<User, Error> {
        self.ensure_available()?;
        let users = bounded(self.lock_timeout, self.users.read(), || {
            "the user directory".to_string()
        })
        .await?;
        users
            .by_name
            .get(username.trim())
            .and_then(|id| users.by_id.get(id))
            .cloned()
            .ok_or_else(|| Error::NotFound(Missing::Username(username.to_string())))
    }

    async fn get_user(&self, id: UserId) -> Result<User, Error> {
        self.ensure_available()?;
        let users = bounded(self.lock_timeout, self.users.read(), || {
            "the user directory".to_string()
        })
        .await?;
        users
            .by_id
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(Missing::User(id)))
    }

    async fn is_admin(&self, id: UserId) -> Result<bool, Error> {
        Ok(self.get_user(id).await?.is_admin())
    }
}
