use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::types::{Candle, CurrencyPair};
use super::MarketDataSource;

/// Serves preloaded candles. Deterministic, used for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketDataSource {
    candles: HashMap<CurrencyPair, Vec<Candle>>,
}

impl InMemoryMarketDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, pair: CurrencyPair, candles: Vec<Candle>) -> Self {
        self.insert(pair, candles);
        self
    }

    /// Replaces any candles already stored for `pair`.
    pub fn insert(&mut self, pair: CurrencyPair, candles: Vec<Candle>) {
        self.candles.insert(pair, candles);
    }
}

#[async_trait]
impl MarketDataSource for InMemoryMarketDataSource {
    async fn fetch_candles(
        &self,
        pair: &CurrencyPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let mut candles: Vec<Candle> = self
            .candles
            .get(pair)
            .map(|stored| {
                stored
                    .iter()
                    .filter(|c| c.timestamp >= start && c.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        candles.sort_by_key(|c| c.timestamp);
        debug!("Serving {} in-memory candles for {}", candles.len(), pair);
        Ok(candles)
    }
}
