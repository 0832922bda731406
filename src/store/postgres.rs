//! PostgreSQL adapter
//!
//! A `PgUnitOfWork` wraps one `sqlx::Transaction`. Balance arithmetic is
//! done by the database inside a single conditional UPDATE.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use uuid::Uuid;

use crate::domain::{
    Account, AccountStatus, AccountType, Bill, LineCode, Position, PostingLeg, Trade, TradeType,
    Transaction, TransactionType,
};

use super::{
    AccountStore, BillStore, LedgerStore, PositionStore, StoreError, StoreResult,
    TransactionStore, UnitOfWork, UserStore,
};

/// Postgres-backed ledger store
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> StoreResult<PgUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }
}

/// One database transaction on one pooled connection
pub struct PgUnitOfWork {
    tx: PgTransaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// =========================================================================
// Row mapping
// =========================================================================

const ACCOUNT_COLUMNS: &str = "id, owner_id, balance, status, account_type, created_at";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    owner_id: Uuid,
    balance: Decimal,
    status: String,
    account_type: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            owner_id: row.owner_id,
            balance: row.balance,
            status: row
                .status
                .parse::<AccountStatus>()
                .map_err(|e| StoreError::corrupt("accounts", e))?,
            account_type: row
                .account_type
                .parse::<AccountType>()
                .map_err(|e| StoreError::corrupt("accounts", e))?,
            created_at: row.created_at,
        })
    }
}

const TRANSACTION_COLUMNS: &str = "id, source_account_id, destination_account_id, amount, \
     transaction_type, description, transfer_id, posting_leg, transaction_date, created_at";

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    source_account_id: Uuid,
    destination_account_id: Option<Uuid>,
    amount: Decimal,
    transaction_type: String,
    description: String,
    transfer_id: Option<Uuid>,
    posting_leg: Option<String>,
    transaction_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let leg = row
            .posting_leg
            .map(|leg| leg.parse::<PostingLeg>())
            .transpose()
            .map_err(|e| StoreError::corrupt("transactions", e))?;

        Ok(Transaction {
            id: row.id,
            source_account_id: row.source_account_id,
            destination_account_id: row.destination_account_id,
            amount: row.amount,
            transaction_type: row
                .transaction_type
                .parse::<TransactionType>()
                .map_err(|e| StoreError::corrupt("transactions", e))?,
            description: row.description,
            transfer_id: row.transfer_id,
            leg,
            transaction_date: row.transaction_date,
            created_at: row.created_at,
        })
    }
}

const BILL_COLUMNS: &str = "id, title, amount, due_date, bank_code, wallet_code, our_number, \
     line_code, owner_id, paid_at, created_at";

#[derive(sqlx::FromRow)]
struct BillRow {
    id: Uuid,
    title: String,
    amount: Decimal,
    due_date: NaiveDate,
    bank_code: String,
    wallet_code: String,
    our_number: String,
    line_code: String,
    owner_id: Option<Uuid>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BillRow> for Bill {
    type Error = StoreError;

    fn try_from(row: BillRow) -> Result<Self, Self::Error> {
        Ok(Bill {
            id: row.id,
            title: row.title,
            amount: row.amount,
            due_date: row.due_date,
            bank_code: row.bank_code,
            wallet_code: row.wallet_code,
            our_number: row.our_number,
            line_code: LineCode::try_from(row.line_code)
                .map_err(|e| StoreError::corrupt("bills", e.to_string()))?,
            owner_id: row.owner_id,
            paid_at: row.paid_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PositionRow {
    user_id: Uuid,
    asset_id: Uuid,
    quantity: Decimal,
    average_price: Decimal,
    last_updated: DateTime<Utc>,
}

impl From<PositionRow> for Position {
    fn from(row: PositionRow) -> Self {
        Position {
            user_id: row.user_id,
            asset_id: row.asset_id,
            quantity: row.quantity,
            average_price: row.average_price,
            last_updated: row.last_updated,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TradeRow {
    id: Uuid,
    user_id: Uuid,
    asset_id: Uuid,
    trade_type: String,
    price: Decimal,
    quantity: Decimal,
    executed_at: DateTime<Utc>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = StoreError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        Ok(Trade {
            id: row.id,
            user_id: row.user_id,
            asset_id: row.asset_id,
            trade_type: row
                .trade_type
                .parse::<TradeType>()
                .map_err(|e| StoreError::corrupt("trades", e))?,
            price: row.price,
            quantity: row.quantity,
            executed_at: row.executed_at,
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// =========================================================================
// AccountStore
// =========================================================================

#[async_trait]
impl AccountStore for PgUnitOfWork {
    async fn find_account(&mut self, id: Uuid) -> StoreResult<Option<Account>> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS))
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;

        row.map(Account::try_from).transpose()
    }

    async fn lock_account(&mut self, id: Uuid) -> StoreResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn first_active_account(&mut self, owner_id: Uuid) -> StoreResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM accounts
            WHERE owner_id = $1 AND status = 'ACTIVE'
            ORDER BY created_at, id
            LIMIT 1
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn insert_account(&mut self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_id, balance, status, account_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id)
        .bind(account.owner_id)
        .bind(account.balance)
        .bind(account.status.as_str())
        .bind(account.account_type.as_str())
        .bind(account.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_account_status(&mut self, id: Uuid, status: AccountStatus) -> StoreResult<u64> {
        let rows_affected = sqlx::query("UPDATE accounts SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    async fn adjust_balance(&mut self, id: Uuid, delta: Decimal) -> StoreResult<u64> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + $2
            WHERE id = $1
              AND status = 'ACTIVE'
              AND balance + $2 >= 0
            "#,
        )
        .bind(id)
        .bind(delta)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }
}

// =========================================================================
// TransactionStore
// =========================================================================

#[async_trait]
impl TransactionStore for PgUnitOfWork {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> StoreResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO transactions (
                id, source_account_id, destination_account_id, amount, transaction_type,
                description, transfer_id, posting_leg, transaction_date, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.source_account_id)
        .bind(transaction.destination_account_id)
        .bind(transaction.amount)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.description)
        .bind(transaction.transfer_id)
        .bind(transaction.leg.map(|leg| leg.as_str()))
        .bind(transaction.transaction_date)
        .bind(transaction.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn transactions_for_account(&mut self, account_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE source_account_id = $1
            ORDER BY created_at DESC, id
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&mut *self.tx)
        .await?;

        collect(rows)
    }

    async fn transactions_for_transfer(&mut self, transfer_id: Uuid) -> StoreResult<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE transfer_id = $1 ORDER BY posting_leg DESC",
            TRANSACTION_COLUMNS
        ))
        .bind(transfer_id)
        .fetch_all(&mut *self.tx)
        .await?;

        collect(rows)
    }

    async fn account_has_transactions(&mut self, account_id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM transactions
                WHERE source_account_id = $1 OR destination_account_id = $1
            )
            "#,
        )
        .bind(account_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }
}

// =========================================================================
// BillStore
// =========================================================================

#[async_trait]
impl BillStore for PgUnitOfWork {
    async fn insert_bill(&mut self, bill: &Bill) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bills (
                id, title, amount, due_date, status, bank_code, wallet_code, our_number,
                line_code, owner_id, paid_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(bill.id)
        .bind(&bill.title)
        .bind(bill.amount)
        .bind(bill.due_date)
        .bind(bill.status().as_str())
        .bind(&bill.bank_code)
        .bind(&bill.wallet_code)
        .bind(&bill.our_number)
        .bind(bill.line_code.as_str())
        .bind(bill.owner_id)
        .bind(bill.paid_at)
        .bind(bill.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_bill(&mut self, id: Uuid) -> StoreResult<Option<Bill>> {
        let row: Option<BillRow> =
            sqlx::query_as(&format!("SELECT {} FROM bills WHERE id = $1", BILL_COLUMNS))
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;

        row.map(Bill::try_from).transpose()
    }

    async fn lock_bill(&mut self, id: Uuid) -> StoreResult<Option<Bill>> {
        let row: Option<BillRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bills WHERE id = $1 FOR UPDATE",
            BILL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Bill::try_from).transpose()
    }

    async fn mark_bill_paid(&mut self, bill: &Bill) -> StoreResult<u64> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE bills
            SET status = 'PAID', paid_at = $2
            WHERE id = $1 AND paid_at IS NULL
            "#,
        )
        .bind(bill.id)
        .bind(bill.paid_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }

    async fn bills_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<Bill>> {
        let rows: Vec<BillRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bills WHERE owner_id = $1 ORDER BY due_date, created_at",
            BILL_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await?;

        collect(rows)
    }
}

// =========================================================================
// PositionStore
// =========================================================================

#[async_trait]
impl PositionStore for PgUnitOfWork {
    async fn find_position(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Option<Position>> {
        let row: Option<PositionRow> = sqlx::query_as(
            r#"
            SELECT user_id, asset_id, quantity, average_price, last_updated
            FROM positions
            WHERE user_id = $1 AND asset_id = $2
            "#,
        )
        .bind(user_id)
        .bind(asset_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Position::from))
    }

    async fn lock_position(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Position> {
        // A bare SELECT ... FOR UPDATE locks nothing when the row is missing
        sqlx::query(
            r#"
            INSERT INTO positions (user_id, asset_id, quantity, average_price, last_updated)
            VALUES ($1, $2, 0, 0, NOW())
            ON CONFLICT (user_id, asset_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(asset_id)
        .execute(&mut *self.tx)
        .await?;

        let row: PositionRow = sqlx::query_as(
            r#"
            SELECT user_id, asset_id, quantity, average_price, last_updated
            FROM positions
            WHERE user_id = $1 AND asset_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(asset_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Position::from(row))
    }

    async fn upsert_position(&mut self, position: &Position) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (user_id, asset_id, quantity, average_price, last_updated)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, asset_id) DO UPDATE
            SET quantity = EXCLUDED.quantity,
                average_price = EXCLUDED.average_price,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(position.user_id)
        .bind(position.asset_id)
        .bind(position.quantity)
        .bind(position.average_price)
        .bind(position.last_updated)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_trade(&mut self, trade: &Trade) -> StoreResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO trades (id, user_id, asset_id, trade_type, price, quantity, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(trade.id)
        .bind(trade.user_id)
        .bind(trade.asset_id)
        .bind(trade.trade_type.as_str())
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.executed_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(id)
    }

    async fn trades_for(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Vec<Trade>> {
        let rows: Vec<TradeRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, asset_id, trade_type, price, quantity, executed_at
            FROM trades
            WHERE user_id = $1 AND asset_id = $2
            ORDER BY executed_at, id
            "#,
        )
        .bind(user_id)
        .bind(asset_id)
        .fetch_all(&mut *self.tx)
        .await?;

        collect(rows)
    }
}

#[async_trait]
impl UserStore for PgUnitOfWork {
    async fn user_exists(&mut self, id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(exists)
    }
}
