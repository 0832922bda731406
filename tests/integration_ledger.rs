//! Postgres integration tests
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

mod common;

use chrono::{Duration, Utc};
use ledger_core::domain::{BillStatus, DomainError, PostingLeg};
use ledger_core::handlers::{
    AccountOperations, BillSettlement, CashCommand, CreateBillCommand, PayBillCommand,
    PositionTracker, TradeCommand, TransferCommand, TransferCoordinator,
};
use ledger_core::{AppError, PgLedgerStore};
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{balance_of, seed_account, seed_user, setup_test_db};

fn domain_err(err: AppError) -> DomainError {
    match err {
        AppError::Domain(e) => e,
        other => panic!("Expected domain error, got: {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_transfer_round_trip() {
    let pool = setup_test_db().await;
    let source = seed_account(&pool, dec!(200.00)).await;
    let destination = seed_account(&pool, dec!(5.00)).await;
    let coordinator = TransferCoordinator::new(PgLedgerStore::new(pool.clone()));

    let result = coordinator
        .transfer(TransferCommand::to_account(source.id, destination.id, dec!(75.25)))
        .await
        .unwrap();

    assert_eq!(result.new_source_balance, dec!(124.75));
    assert_eq!(balance_of(&pool, source.id).await, dec!(124.75));
    assert_eq!(balance_of(&pool, destination.id).await, dec!(80.25));

    let transfer = coordinator.find_transfer(result.transfer_id).await.unwrap();
    assert_eq!(transfer.debit.leg, PostingLeg::Debit);
    assert_eq!(transfer.debit.account_id, source.id);
    assert_eq!(transfer.credit.account_id, destination.id);
    assert_eq!(transfer.credit.amount, dec!(75.25));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_transfer_insufficient_funds_is_atomic() {
    let pool = setup_test_db().await;
    let source = seed_account(&pool, dec!(10.00)).await;
    let destination = seed_account(&pool, dec!(0)).await;
    let coordinator = TransferCoordinator::new(PgLedgerStore::new(pool.clone()));

    let err = coordinator
        .transfer(TransferCommand::to_account(source.id, destination.id, dec!(10.01)))
        .await
        .unwrap_err();

    assert!(matches!(domain_err(err), DomainError::InsufficientFunds { .. }));
    assert_eq!(balance_of(&pool, source.id).await, dec!(10.00));
    assert_eq!(balance_of(&pool, destination.id).await, dec!(0));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_transfers_never_overdraw() {
    let pool = setup_test_db().await;
    let source = seed_account(&pool, dec!(50.00)).await;
    let destination = seed_account(&pool, dec!(0)).await;
    let coordinator = TransferCoordinator::new(PgLedgerStore::new(pool.clone()));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let coordinator = coordinator.clone();
        let command = TransferCommand::to_account(source.id, destination.id, dec!(3.00));
        handles.push(tokio::spawn(async move { coordinator.transfer(command).await }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 16);
    assert_eq!(balance_of(&pool, source.id).await, dec!(2.00));
    assert_eq!(balance_of(&pool, destination.id).await, dec!(48.00));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_transactions_reject_updates() {
    let pool = setup_test_db().await;
    let account = seed_account(&pool, dec!(1.00)).await;

    let result = sqlx::query("UPDATE transactions SET amount = 999 WHERE source_account_id = $1")
        .bind(account.id)
        .execute(&pool)
        .await;

    assert!(result.is_err());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_bill_paid_exactly_once() {
    let pool = setup_test_db().await;
    let payer = seed_account(&pool, dec!(300.00)).await;
    let owner = seed_user(&pool).await;
    let settlement = BillSettlement::new(PgLedgerStore::new(pool.clone()));

    let bill = settlement
        .create(
            CreateBillCommand::new(
                "Electricity",
                dec!(120.40),
                Utc::now().date_naive() + Duration::days(10),
                "001",
                "9",
                "123456",
            )
            .owned_by(owner),
        )
        .await
        .unwrap();
    assert_eq!(bill.line_code.as_str().len(), 48);

    let paid = settlement
        .pay(PayBillCommand::new(bill.id, payer.id))
        .await
        .unwrap();
    assert_eq!(paid.new_balance, dec!(179.60));

    let err = settlement
        .pay(PayBillCommand::new(bill.id, payer.id))
        .await
        .unwrap_err();
    assert_eq!(domain_err(err), DomainError::AlreadyPaid(bill.id));
    assert_eq!(balance_of(&pool, payer.id).await, dec!(179.60));

    let stored = settlement.find(bill.id).await.unwrap();
    assert_eq!(stored.status(), BillStatus::Paid);
    assert_eq!(stored.line_code, bill.line_code);
    assert_eq!(settlement.list_for_owner(owner).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_position_weighted_average() {
    let pool = setup_test_db().await;
    let user = seed_user(&pool).await;
    let asset = Uuid::new_v4();
    let tracker = PositionTracker::new(PgLedgerStore::new(pool.clone()));

    tracker
        .process_transaction(TradeCommand::buy(user, asset, dec!(100), dec!(10)))
        .await
        .unwrap();
    tracker
        .process_transaction(TradeCommand::buy(user, asset, dec!(200), dec!(10)))
        .await
        .unwrap();

    let err = tracker
        .process_transaction(TradeCommand::sell(user, asset, dec!(1), dec!(25)))
        .await
        .unwrap_err();
    assert!(matches!(domain_err(err), DomainError::InsufficientQuantity { .. }));

    let position = tracker.position(user, asset).await.unwrap();
    assert_eq!(position.quantity, dec!(20));
    assert_eq!(position.average_price, dec!(150));
    assert_eq!(tracker.trades(user, asset).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_first_buys_all_count() {
    let pool = setup_test_db().await;
    let user = seed_user(&pool).await;
    let asset = Uuid::new_v4();
    let tracker = PositionTracker::new(PgLedgerStore::new(pool.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            tracker
                .process_transaction(TradeCommand::buy(user, asset, dec!(25), dec!(3)))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let position = tracker.position(user, asset).await.unwrap();
    assert_eq!(position.quantity, dec!(24));
    assert_eq!(position.average_price, dec!(25));
    assert_eq!(tracker.trades(user, asset).await.unwrap().len(), 8);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_withdraw_and_close() {
    let pool = setup_test_db().await;
    let funded = seed_account(&pool, dec!(20.00)).await;
    let empty = seed_account(&pool, dec!(0)).await;
    let accounts = AccountOperations::new(PgLedgerStore::new(pool.clone()));

    let result = accounts
        .withdraw(CashCommand::new(funded.id, dec!(20.00)))
        .await
        .unwrap();
    assert_eq!(result.new_balance, dec!(0));
    assert_eq!(accounts.statement(funded.id).await.unwrap().len(), 2);

    let err = accounts.close(funded.id).await.unwrap_err();
    assert_eq!(domain_err(err), DomainError::AccountHasTransactions(funded.id));

    let closed = accounts.close(empty.id).await.unwrap();
    assert!(!closed.is_active());
}
