use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::indicators::{mean, population_std_dev};
use crate::types::Candle;
use super::{MarketTrend, TrendReading};

/// Classifies the trailing window of candles by comparing a short and a long
/// simple moving average of closes.
#[derive(Debug, Clone, Default)]
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Never fails: too little data or nonsensical windows read as sideways
    /// with zero momentum and volatility.
    pub fn analyze(&self, candles: &[Candle], short_window: usize, long_window: usize) -> TrendReading {
        if short_window == 0 || short_window >= long_window || candles.len() < long_window {
            return TrendReading::neutral();
        }

        let closes: Vec<Decimal> = candles[candles.len() - long_window..]
            .iter()
            .map(|c| c.close)
            .collect();

        let (long_avg, short_avg, volatility) = match (
            mean(&closes),
            mean(&closes[closes.len() - short_window..]),
            population_std_dev(&closes),
        ) {
            (Some(l), Some(s), Some(v)) => (l, s, v),
            _ => return TrendReading::neutral(),
        };

        let momentum = short_avg - long_avg;
        let threshold = if long_avg.is_zero() {
            dec!(0.0001)
        } else {
            dec!(0.0005) * long_avg
        };

        let trend = if momentum > threshold {
            MarketTrend::Bullish
        } else if momentum < -threshold {
            MarketTrend::Bearish
        } else {
            MarketTrend::Sideways
        };

        TrendReading {
            trend,
            momentum,
            volatility,
        }
    }
}
