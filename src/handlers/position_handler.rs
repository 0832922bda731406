//! Position Tracker
//!
//! Records trades and keeps the (user, asset) position in step with them
//! inside the same unit of work.

use uuid::Uuid;

use crate::domain::{DomainError, Position, Trade};
use crate::error::AppResult;
use crate::store::{LedgerStore, PositionStore, UnitOfWork, UserStore};

use super::{TradeCommand, TradeResult};

#[derive(Debug, Clone)]
pub struct PositionTracker<S> {
    store: S,
}

impl<S: LedgerStore> PositionTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a trade and fold it into the position
    pub async fn process_transaction(&self, command: TradeCommand) -> AppResult<TradeResult> {
        let trade = Trade::new(
            command.user_id,
            command.asset_id,
            command.trade_type,
            command.price,
            command.quantity,
        )?;

        let mut tx = self.store.begin().await?;

        if !tx.user_exists(trade.user_id).await? {
            return Err(DomainError::UserNotFound(trade.user_id).into());
        }

        tx.insert_trade(&trade).await?;

        let mut position = tx.lock_position(trade.user_id, trade.asset_id).await?;

        if let Err(e) = position.apply(&trade) {
            tracing::warn!(
                user_id = %trade.user_id,
                asset_id = %trade.asset_id,
                "Trade rejected: {}",
                e
            );
            return Err(e.into());
        }

        tx.upsert_position(&position).await?;
        tx.commit().await?;

        tracing::info!(
            trade_id = %trade.id,
            "{} {} @ {}: position {} @ avg {}",
            trade.trade_type,
            trade.quantity,
            trade.price,
            position.quantity,
            position.average_price
        );

        Ok(TradeResult { trade, position })
    }

    pub async fn position(&self, user_id: Uuid, asset_id: Uuid) -> AppResult<Position> {
        let mut tx = self.store.begin().await?;
        let position = tx.find_position(user_id, asset_id).await?;
        tx.rollback().await?;

        Ok(position.ok_or(DomainError::PositionNotFound { user_id, asset_id })?)
    }

    pub async fn trades(&self, user_id: Uuid, asset_id: Uuid) -> AppResult<Vec<Trade>> {
        let mut tx = self.store.begin().await?;
        let trades = tx.trades_for(user_id, asset_id).await?;
        tx.rollback().await?;

        Ok(trades)
    }
}
