use rust_decimal::Decimal;

use crate::config::TradingConfig;
use crate::error::TradingError;
use crate::types::{Candle, CurrencyPair, Direction, Position, TradeAction, TradeSignal};
use super::{MarketTrend, Strategy, TrendAnalyzer};

pub const EXIT_REASON: &str = "exit on trailing stop or target";
pub const MAINTAIN_REASON: &str = "position maintained";
pub const NO_TREND_REASON: &str = "no clear trend signal";

/// Moving-average crossover strategy.
///
/// With no position open it follows the trend: buy on bullish momentum, sell
/// short on bearish momentum. With a position open it only ever decides
/// between holding and closing.
pub struct SignalGenerator {
    name: String,
    analyzer: TrendAnalyzer,
}

impl SignalGenerator {
    pub fn new(analyzer: TrendAnalyzer) -> Self {
        Self {
            name: "MA_Crossover".to_string(),
            analyzer,
        }
    }

    fn confidence(momentum: Decimal, volatility: Decimal) -> Decimal {
        if volatility.is_zero() {
            return momentum.abs().min(Decimal::ONE);
        }
        (momentum.abs() / volatility).clamp(Decimal::ZERO, Decimal::ONE)
    }

    /// Closes when either trigger fires: the configured stop/take levels
    /// around the entry price, or an unrealized loss of half the stop-loss
    /// factor relative to the entry value (floored at one unit of quote).
    pub fn should_close(position: &Position, latest: &Candle, config: &TradingConfig) -> bool {
        let price = latest.close;
        let threshold = config.stop_loss_factor / Decimal::TWO;
        let pnl_ratio = position.unrealized_pnl(price) / position.entry_value().max(Decimal::ONE);
        let loss_limit_hit = pnl_ratio <= -threshold;

        match position.direction {
            Direction::Long => {
                let take_profit = position.entry_price * (Decimal::ONE + config.take_profit_factor);
                let stop_loss = position.entry_price * (Decimal::ONE - config.stop_loss_factor);
                price >= take_profit || price <= stop_loss || loss_limit_hit
            }
            Direction::Short => {
                let take_profit = position.entry_price * (Decimal::ONE - config.take_profit_factor);
                let stop_loss = position.entry_price * (Decimal::ONE + config.stop_loss_factor);
                price <= take_profit || price >= stop_loss || loss_limit_hit
            }
        }
    }
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(TrendAnalyzer::new())
    }
}

impl Strategy for SignalGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        pair: &CurrencyPair,
        candles: &[Candle],
        config: &TradingConfig,
        open_position: Option<&Position>,
    ) -> Result<TradeSignal, TradingError> {
        let latest = candles.last().ok_or(TradingError::EmptyCandles)?;

        let reading = self
            .analyzer
            .analyze(candles, config.short_window, config.long_window);
        let confidence = Self::confidence(reading.momentum, reading.volatility);

        let signal = |action: TradeAction, reason: &str| {
            TradeSignal::new(pair.clone(), action, latest.timestamp, latest.close, confidence, reason)
        };

        if let Some(position) = open_position {
            let decision = if Self::should_close(position, latest, config) {
                signal(TradeAction::Close, EXIT_REASON)
            } else {
                signal(TradeAction::Hold, MAINTAIN_REASON)
            };
            return Ok(decision);
        }

        let close = latest.close;
        let decision = match reading.trend {
            MarketTrend::Bullish => signal(
                TradeAction::Buy,
                &format!("bullish momentum detected (momentum={:.5})", reading.momentum),
            )
            .with_levels(
                close * (Decimal::ONE - config.stop_loss_factor),
                close * (Decimal::ONE + config.take_profit_factor),
            ),
            MarketTrend::Bearish => signal(
                TradeAction::Sell,
                &format!("bearish momentum detected (momentum={:.5})", reading.momentum),
            )
            .with_levels(
                close * (Decimal::ONE + config.stop_loss_factor),
                close * (Decimal::ONE - config.take_profit_factor),
            ),
            MarketTrend::Sideways => signal(TradeAction::Hold, NO_TREND_REASON),
        };

        Ok(decision)
    }
}
