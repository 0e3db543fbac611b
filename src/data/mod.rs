pub mod memory;
pub mod stooq;

pub use memory::*;
pub use stooq::*;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Candle, CurrencyPair};

/// Source of historical candles for the backtest engine.
///
/// Implementations return candles within `[start, end]` inclusive, ordered by
/// ascending timestamp, with no gap filling.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_candles(
        &self,
        pair: &CurrencyPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;
}
