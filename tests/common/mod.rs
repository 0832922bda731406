//! Common test utilities

use ledger_core::db;
use ledger_core::domain::{Account, AccountType};
use ledger_core::handlers::{AccountOperations, CashCommand, OpenAccountCommand};
use ledger_core::PgLedgerStore;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

static SCHEMA: OnceCell<()> = OnceCell::const_new();

/// Connect and make sure the schema exists. Tests isolate themselves by
/// seeding fresh ids rather than truncating shared tables.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    SCHEMA
        .get_or_init(|| async {
            db::apply_schema(&pool).await.expect("Failed to apply schema");
        })
        .await;

    pool
}

/// Insert a user row and return its id
pub async fn seed_user(pool: &PgPool) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name) VALUES ($1, 'test user')")
        .bind(user_id)
        .execute(pool)
        .await
        .expect("Failed to seed user");
    user_id
}

/// Open an account for a fresh user and fund it through a deposit
pub async fn seed_account(pool: &PgPool, balance: Decimal) -> Account {
    let owner_id = seed_user(pool).await;
    let accounts = AccountOperations::new(PgLedgerStore::new(pool.clone()));

    let account = accounts
        .open(OpenAccountCommand {
            owner_id,
            account_type: AccountType::Checking,
        })
        .await
        .expect("Failed to open account");

    if balance > Decimal::ZERO {
        accounts
            .deposit(CashCommand::new(account.id, balance))
            .await
            .expect("Failed to fund account");
    }

    account
}

pub async fn balance_of(pool: &PgPool, account_id: Uuid) -> Decimal {
    sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read balance")
}
