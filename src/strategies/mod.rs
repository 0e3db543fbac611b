pub mod trend;
pub mod crossover;

pub use trend::*;
pub use crossover::*;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::TradingConfig;
use crate::error::TradingError;
use crate::types::{Candle, CurrencyPair, Position, TradeSignal};

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Decide what to do with `pair` given every candle seen so far and the
    /// currently open position for that pair, if any.
    fn generate(
        &self,
        pair: &CurrencyPair,
        candles: &[Candle],
        config: &TradingConfig,
        open_position: Option<&Position>,
    ) -> Result<TradeSignal, TradingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketTrend {
    Sideways,
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub trend: MarketTrend,
    /// Short-window mean close minus long-window mean close.
    pub momentum: Decimal,
    /// Population standard deviation of closes over the long window.
    pub volatility: Decimal,
}

impl TrendReading {
    pub fn neutral() -> Self {
        Self {
            trend: MarketTrend::Sideways,
            momentum: Decimal::ZERO,
            volatility: Decimal::ZERO,
        }
    }
}
