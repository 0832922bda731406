//! Investment positions
//!
//! One position per (user, asset). Buys move the weighted-average cost;
//! sells only reduce quantity.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::DomainError;

/// Fractional digits kept on average prices
pub const PRICE_SCALE: u32 = 8;

/// Fractional digits accepted on trade quantities
pub const QUANTITY_SCALE: u32 = 8;

/// Exclusive bound on prices and quantities (20 integer digits, `NUMERIC(28, 8)`)
pub const MAX_TRADE_VALUE: Decimal = Decimal::from_parts(1_661_992_960, 1_808_227_885, 5, false, 0);

pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            other => Err(format!("unknown trade type '{}'", other)),
        }
    }
}

/// A recorded buy or sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub trade_type: TradeType,
    pub price: Decimal,
    pub quantity: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(
        user_id: Uuid,
        asset_id: Uuid,
        trade_type: TradeType,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<Self, DomainError> {
        if price <= Decimal::ZERO {
            return Err(DomainError::validation(format!("price must be positive (got {})", price)));
        }
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "quantity must be positive (got {})",
                quantity
            )));
        }
        if price.normalize().scale() > PRICE_SCALE {
            return Err(DomainError::validation(format!(
                "price has more than {} decimal places",
                PRICE_SCALE
            )));
        }
        if quantity.normalize().scale() > QUANTITY_SCALE {
            return Err(DomainError::validation(format!(
                "quantity has more than {} decimal places",
                QUANTITY_SCALE
            )));
        }
        if price >= MAX_TRADE_VALUE || quantity >= MAX_TRADE_VALUE {
            return Err(DomainError::Overflow(format!(
                "price and quantity must stay below {}",
                MAX_TRADE_VALUE
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            asset_id,
            trade_type,
            price,
            quantity,
            executed_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    /// The implicit starting point of a (user, asset) pair before any trade
    pub fn empty(user_id: Uuid, asset_id: Uuid) -> Self {
        Self {
            user_id,
            asset_id,
            quantity: Decimal::ZERO,
            average_price: Decimal::ZERO,
            last_updated: Utc::now(),
        }
    }

    /// Fold a trade into the position.
    ///
    /// On error the position is left untouched.
    pub fn apply(&mut self, trade: &Trade) -> Result<(), DomainError> {
        match trade.trade_type {
            TradeType::Buy => {
                let new_quantity = self
                    .quantity
                    .checked_add(trade.quantity)
                    .filter(|q| *q < MAX_TRADE_VALUE)
                    .ok_or_else(|| overflow("position quantity"))?;
                if new_quantity > Decimal::ZERO {
                    let cost = self
                        .quantity
                        .checked_mul(self.average_price)
                        .zip(trade.price.checked_mul(trade.quantity))
                        .and_then(|(held, bought)| held.checked_add(bought))
                        .ok_or_else(|| overflow("position cost"))?;
                    let average = cost
                        .checked_div(new_quantity)
                        .ok_or_else(|| overflow("average price"))?;
                    self.average_price = round_price(average);
                }
                self.quantity = new_quantity;
            }
            TradeType::Sell => {
                let new_quantity = self.quantity - trade.quantity;
                if new_quantity < Decimal::ZERO {
                    return Err(DomainError::insufficient_quantity(trade.quantity, self.quantity));
                }
                self.quantity = new_quantity;
            }
        }
        self.last_updated = trade.executed_at;
        Ok(())
    }
}

fn overflow(what: &str) -> DomainError {
    DomainError::Overflow(format!("{} out of range", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(kind: TradeType, price: Decimal, quantity: Decimal) -> Trade {
        Trade::new(Uuid::nil(), Uuid::nil(), kind, price, quantity).unwrap()
    }

    #[test]
    fn test_weighted_average_on_buys() {
        let mut position = Position::empty(Uuid::nil(), Uuid::nil());

        position.apply(&trade(TradeType::Buy, dec!(100), dec!(10))).unwrap();
        position.apply(&trade(TradeType::Buy, dec!(200), dec!(10))).unwrap();

        assert_eq!(position.quantity, dec!(20));
        assert_eq!(position.average_price, dec!(150.00));
    }

    #[test]
    fn test_oversell_leaves_position_unchanged() {
        let mut position = Position::empty(Uuid::nil(), Uuid::nil());
        position.apply(&trade(TradeType::Buy, dec!(100), dec!(10))).unwrap();
        position.apply(&trade(TradeType::Buy, dec!(200), dec!(10))).unwrap();
        let before = position.clone();

        let result = position.apply(&trade(TradeType::Sell, dec!(180), dec!(25)));

        assert!(matches!(result, Err(DomainError::InsufficientQuantity { .. })));
        assert_eq!(position, before);
    }

    #[test]
    fn test_sell_keeps_average_price() {
        let mut position = Position::empty(Uuid::nil(), Uuid::nil());
        position.apply(&trade(TradeType::Buy, dec!(10), dec!(4))).unwrap();
        position.apply(&trade(TradeType::Sell, dec!(99), dec!(4))).unwrap();

        assert_eq!(position.quantity, Decimal::ZERO);
        assert_eq!(position.average_price, dec!(10));
    }

    #[test]
    fn test_average_is_rounded_to_eight_places() {
        let mut position = Position::empty(Uuid::nil(), Uuid::nil());
        position.apply(&trade(TradeType::Buy, dec!(1), dec!(1))).unwrap();
        position.apply(&trade(TradeType::Buy, dec!(2), dec!(2))).unwrap();

        // (1 + 4) / 3
        assert_eq!(position.average_price, dec!(1.66666667));
    }

    #[test]
    fn test_trade_validation() {
        let id = Uuid::nil();
        assert!(Trade::new(id, id, TradeType::Buy, Decimal::ZERO, dec!(1)).is_err());
        assert!(Trade::new(id, id, TradeType::Buy, dec!(1), dec!(-1)).is_err());
        assert!(Trade::new(id, id, TradeType::Buy, dec!(1), dec!(0.000000001)).is_err());
        assert!(matches!(
            Trade::new(id, id, TradeType::Buy, dec!(10.123456789), dec!(1)),
            Err(DomainError::Validation(_))
        ));
        assert!(Trade::new(id, id, TradeType::Buy, dec!(10.12345678), dec!(1)).is_ok());
    }

    #[test]
    fn test_trade_rejects_values_beyond_column_range() {
        let id = Uuid::nil();
        assert!(matches!(
            Trade::new(id, id, TradeType::Buy, Decimal::MAX, Decimal::TWO),
            Err(DomainError::Overflow(_))
        ));
        assert!(matches!(
            Trade::new(id, id, TradeType::Buy, dec!(1), MAX_TRADE_VALUE),
            Err(DomainError::Overflow(_))
        ));
    }

    #[test]
    fn test_buy_overflow_is_an_error_and_leaves_position() {
        let big = dec!(99999999999999999999);
        let mut position = Position::empty(Uuid::nil(), Uuid::nil());
        position.apply(&trade(TradeType::Buy, big, big)).unwrap_err();
        assert_eq!(position.quantity, Decimal::ZERO);

        position.apply(&trade(TradeType::Buy, dec!(1), big)).unwrap();
        let before = position.clone();

        let result = position.apply(&trade(TradeType::Buy, dec!(1), dec!(1)));

        assert!(matches!(result, Err(DomainError::Overflow(_))));
        assert_eq!(position, before);
    }
}
