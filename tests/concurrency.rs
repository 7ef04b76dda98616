use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bank_simulator::domain::{AccountId, AccountStore, Ledger, Transactional};
use bank_simulator::{Bank, Error, MemoryStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn funded_bank(balances: &[Decimal]) -> (Arc<Bank<MemoryStore>>, Vec<AccountId>) {
    let bank = Bank::new(MemoryStore::default());
    let mut accounts = Vec::new();
    for (i, balance) in balances.iter().enumerate() {
        let name = format!("user{i}");
        let (_, account) = bank.register(&name, &name).await.unwrap();
        if *balance > Decimal::ZERO {
            bank.deposit(account, *balance).await.unwrap();
        }
        accounts.push(account);
    }
    (Arc::new(bank), accounts)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deposits_lose_no_update() {
    let (bank, accounts) = funded_bank(&[Decimal::ZERO]).await;
    let a = accounts[0];

    let tasks: Vec<_> = (0..200)
        .map(|_| {
            let bank = Arc::clone(&bank);
            tokio::spawn(async move { bank.deposit(a, dec!(1.25)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(bank.balance(a).await.unwrap(), dec!(250.00));
    assert_eq!(bank.store().history(a).await.unwrap().len(), 200);
    assert_eq!(
        bank.store().aggregate(a).await.unwrap().total_deposits,
        dec!(250.00)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_withdrawals_never_overdraw() {
    let (bank, accounts) = funded_bank(&[dec!(100)]).await;
    let a = accounts[0];

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let bank = Arc::clone(&bank);
            tokio::spawn(async move { bank.withdraw(a, dec!(3)).await })
        })
        .collect();
    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(receipt) => {
                assert!(receipt.balance >= Decimal::ZERO);
                succeeded += 1;
            }
            Err(Error::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 33);
    assert_eq!(bank.balance(a).await.unwrap(), dec!(1));
    // one deposit plus each successful withdrawal
    assert_eq!(bank.store().history(a).await.unwrap().len(), 34);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_conserve_money_without_deadlock() {
    let (bank, accounts) = funded_bank(&[dec!(500), dec!(500), dec!(500)]).await;
    let total_before = bank.store().total_balance().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..300usize {
        let bank = Arc::clone(&bank);
        let from = accounts[i % 3];
        let to = accounts[(i + 1 + i / 3 % 2) % 3];
        let amount = Decimal::from((i % 7 + 1) as u64);
        tasks.push(tokio::spawn(async move {
            bank.transfer(from, to, amount).await
        }));
    }

    let outcome = tokio::time::timeout(Duration::from_secs(30), async {
        let mut transfers = 0usize;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => transfers += 1,
                Err(Error::InsufficientFunds { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        transfers
    })
    .await
    .expect("transfers deadlocked");

    assert_eq!(bank.store().total_balance().await.unwrap(), total_before);
    for account in &accounts {
        assert!(bank.balance(*account).await.unwrap() >= Decimal::ZERO);
    }

    // every transfer is one entry, visible from both sides
    let mut entries = 0;
    for account in &accounts {
        let statement = bank.statement(*account).await.unwrap();
        let net = statement.totals.total_deposits - statement.totals.total_withdrawals
            + statement.totals.total_transfers_out
            + statement.totals.total_transfers_in;
        assert_eq!(net, statement.balance);
        entries += statement
            .entries
            .iter()
            .filter(|entry| entry.account_id == *account && entry.destination_account_id.is_some())
            .count();
    }
    assert_eq!(entries, outcome);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_half_a_transfer() {
    let (bank, accounts) = funded_bank(&[dec!(300), dec!(300), dec!(300)]).await;
    let total_before = bank.store().total_balance().await.unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let mut writers = Vec::new();
    for i in 0..240usize {
        let bank = Arc::clone(&bank);
        let from = accounts[i % 3];
        let to = accounts[(i + 2) % 3];
        let amount = Decimal::from((i % 5 + 1) as u64);
        writers.push(tokio::spawn(async move {
            bank.transfer(from, to, amount).await
        }));
    }

    let readers: Vec<_> = accounts
        .iter()
        .map(|account| {
            let bank = Arc::clone(&bank);
            let done = Arc::clone(&done);
            let account = *account;
            tokio::spawn(async move {
                let mut reads = 0usize;
                while !done.load(Ordering::SeqCst) || reads == 0 {
                    assert_eq!(bank.store().total_balance().await.unwrap(), total_before);

                    let statement = bank.statement(account).await.unwrap();
                    let totals = statement.totals;
                    assert_eq!(
                        totals.total_deposits - totals.total_withdrawals
                            + totals.total_transfers_out
                            + totals.total_transfers_in,
                        statement.balance
                    );
                    reads += 1;
                    tokio::task::yield_now().await;
                }
                reads
            })
        })
        .collect();

    tokio::time::timeout(Duration::from_secs(30), async {
        for task in writers {
            match task.await.unwrap() {
                Ok(_) | Err(Error::InsufficientFunds { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        done.store(true, Ordering::SeqCst);
        for task in readers {
            assert!(task.await.unwrap() > 0);
        }
    })
    .await
    .expect("readers or transfers stalled");

    assert_eq!(bank.store().total_balance().await.unwrap(), total_before);
}

#[tokio::test]
async fn contention_surfaces_as_busy() {
    let store = MemoryStore::new(Duration::from_millis(50));
    let bank = Bank::new(store);
    let (_, a) = bank.register("ana", "Ana").await.unwrap();
    let (_, b) = bank.register("bia", "Bia").await.unwrap();
    bank.deposit(a, dec!(10)).await.unwrap();

    let held = bank.store().begin(&[b]).await.unwrap();
    let err = bank.transfer(a, b, dec!(5)).await.unwrap_err();
    assert!(matches!(err, Error::Busy(_)));
    assert!(err.is_transient());
    drop(held);

    assert_eq!(bank.balance(a).await.unwrap(), dec!(10));
    bank.transfer(a, b, dec!(5)).await.unwrap();
    assert_eq!(bank.balance(b).await.unwrap(), dec!(5));
}

#[tokio::test]
async fn shut_down_store_is_unavailable() {
    let (bank, accounts) = funded_bank(&[dec!(10)]).await;
    bank.store().shutdown();

    let err = bank.deposit(accounts[0], dec!(1)).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));
    assert!(err.is_transient());
    assert!(matches!(
        bank.statement(accounts[0]).await,
        Err(Error::StoreUnavailable(_))
    ));
}
