use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::error::TradingError;
use crate::types::{CurrencyPair, Direction, Position, TradeAction, TradeSignal};

/// The simulated account: one cash balance and every position ever opened.
///
/// Single writer. The backtest engine owns it and mutates it sequentially.
#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_capital: Decimal,
    cash: Decimal,
    positions: Vec<Position>,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: Vec::new(),
        }
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Open and closed positions in the order they were opened.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Most recently opened position for `pair` that is still open.
    pub fn get_open_position(&self, pair: &CurrencyPair) -> Option<&Position> {
        self.positions
            .iter()
            .rev()
            .find(|p| &p.pair == pair && p.is_open())
    }

    pub fn has_open_position(&self, pair: &CurrencyPair) -> bool {
        self.get_open_position(pair).is_some()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.iter().filter(|p| p.is_open()).count()
    }

    /// Opens a position from a Buy or Sell signal.
    ///
    /// Returns `None` without touching cash when the signal does not open a
    /// position, the quantity is not positive, or the pair already has an
    /// open position. Buys larger than the cash balance are scaled down to
    /// exactly `cash / price`.
    pub fn open_position(&mut self, signal: &TradeSignal, quantity: Decimal) -> Option<&Position> {
        let direction = match Direction::try_from(signal.action) {
            Ok(direction) => direction,
            Err(_) => {
                debug!("[{}] REJECTED: {} does not open a position", signal.pair, signal.action);
                return None;
            }
        };

        if quantity <= Decimal::ZERO {
            debug!("[{}] REJECTED: non-positive quantity {}", signal.pair, quantity);
            return None;
        }

        if self.has_open_position(&signal.pair) {
            debug!("[{}] REJECTED: position already open", signal.pair);
            return None;
        }

        if signal.price <= Decimal::ZERO {
            debug!("[{}] REJECTED: non-positive price {}", signal.pair, signal.price);
            return None;
        }

        let mut quantity = quantity;
        let mut cost = signal.price * quantity;
        if direction == Direction::Long && cost > self.cash {
            quantity = self.cash / signal.price;
            cost = signal.price * quantity;
            debug!(
                "[{}] Scaled buy down to {:.6} to fit cash {:.2}",
                signal.pair, quantity, self.cash
            );
        }

        let position = match Position::new(
            signal.pair.clone(),
            direction,
            signal.price,
            quantity,
            signal.timestamp,
        ) {
            Ok(position) => position,
            Err(e) => {
                debug!("[{}] REJECTED: {}", signal.pair, e);
                return None;
            }
        };

        match direction {
            Direction::Long => self.cash -= cost,
            Direction::Short => self.cash += cost,
        }

        debug!(
            "[{}] Opened {} {:.6} @ {} (cash now {:.2})",
            signal.pair, direction, quantity, signal.price, self.cash
        );

        self.positions.push(position);
        self.positions.last()
    }

    /// Closes the open position for the signal's pair at the signal's price.
    ///
    /// Returns `Ok(None)` for anything other than a Close signal or when no
    /// position is open for the pair.
    pub fn close_position(&mut self, signal: &TradeSignal) -> Result<Option<&Position>, TradingError> {
        if signal.action != TradeAction::Close {
            return Ok(None);
        }

        let index = match self
            .positions
            .iter()
            .rposition(|p| p.pair == signal.pair && p.is_open())
        {
            Some(index) => index,
            None => {
                debug!("[{}] Close ignored: no open position", signal.pair);
                return Ok(None);
            }
        };

        let position = &mut self.positions[index];
        position.close(signal.price, signal.timestamp)?;

        let proceeds = signal.price * position.quantity;
        match position.direction {
            Direction::Long => self.cash += proceeds,
            Direction::Short => self.cash -= proceeds,
        }

        debug!(
            "[{}] Closed {} @ {}: P&L {:.4} (cash now {:.2})",
            signal.pair,
            position.direction,
            signal.price,
            position.realized_pnl().unwrap_or_default(),
            self.cash
        );

        Ok(Some(&self.positions[index]))
    }

    /// Cash plus the signed market value of every open position with a known
    /// price. Positions without a price are left out.
    pub fn total_equity(&self, prices: &HashMap<CurrencyPair, Decimal>) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.is_open())
            .filter_map(|p| {
                prices
                    .get(&p.pair)
                    .map(|price| p.market_value(*price) * p.direction.sign())
            })
            .fold(self.cash, |equity, value| equity + value)
    }

    pub fn total_realized_profit(&self) -> Decimal {
        self.positions.iter().filter_map(|p| p.realized_pnl()).sum()
    }
}
