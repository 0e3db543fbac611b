use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CurrencyPair, Direction};
use crate::error::TradingError;

/// A simulated holding in one pair. Opened once, closed at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub pair: CurrencyPair,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub opened_at: DateTime<Utc>,
    pub exit_price: Option<Decimal>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn new(
        pair: CurrencyPair,
        direction: Direction,
        entry_price: Decimal,
        quantity: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Result<Self, TradingError> {
        if quantity <= Decimal::ZERO {
            return Err(TradingError::InvalidQuantity(quantity));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            pair,
            direction,
            entry_price,
            quantity,
            opened_at,
            exit_price: None,
            closed_at: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        (current_price - self.entry_price) * self.quantity * self.direction.sign()
    }

    /// `None` until the position is closed.
    pub fn realized_pnl(&self) -> Option<Decimal> {
        self.exit_price
            .map(|exit| (exit - self.entry_price) * self.quantity * self.direction.sign())
    }

    pub fn entry_value(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    pub fn market_value(&self, price: Decimal) -> Decimal {
        price * self.quantity
    }

    pub fn close(&mut self, exit_price: Decimal, closed_at: DateTime<Utc>) -> Result<(), TradingError> {
        if self.closed_at.is_some() {
            return Err(TradingError::PositionAlreadyClosed(self.id.clone()));
        }
        self.exit_price = Some(exit_price);
        self.closed_at = Some(closed_at);
        Ok(())
    }

    /// Holding time; `None` while the position is still open.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.closed_at.map(|closed| closed - self.opened_at)
    }
}
