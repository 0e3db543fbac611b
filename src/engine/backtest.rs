use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::TradingConfig;
use crate::data::MarketDataSource;
use crate::error::TradingError;
use crate::risk::RiskManager;
use crate::strategies::{SignalGenerator, Strategy};
use crate::types::{Candle, CandleBuffer, CurrencyPair, TradeAction};

use super::{Portfolio, RunController, TradingReport};

/// Replays historical candles through the strategy, one pair at a time,
/// against a single shared capital pool.
///
/// Pairs are processed in configuration order and candles in timestamp
/// order, so a given input always produces the same report.
pub struct BacktestEngine {
    config: TradingConfig,
    data_source: Arc<dyn MarketDataSource>,
    strategy: Box<dyn Strategy>,
    risk_manager: RiskManager,
    portfolio: Portfolio,
    controller: RunController,
}

impl BacktestEngine {
    pub fn new(config: TradingConfig, data_source: Arc<dyn MarketDataSource>) -> Result<Self, TradingError> {
        config.validate().map_err(TradingError::InvalidConfig)?;

        Ok(Self {
            portfolio: Portfolio::new(config.initial_capital),
            config,
            data_source,
            strategy: Box::new(SignalGenerator::default()),
            risk_manager: RiskManager::new(),
            controller: RunController::new(),
        })
    }

    pub fn with_controller(mut self, controller: RunController) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Book left behind by the most recent run.
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn controller(&self) -> &RunController {
        &self.controller
    }

    /// Runs a full backtest and returns the completed report.
    ///
    /// Each call starts from a fresh portfolio. A cancelled run returns
    /// [`TradingError::Cancelled`] carrying the partial, incomplete report.
    pub async fn run(&mut self) -> Result<TradingReport, TradingError> {
        self.portfolio = Portfolio::new(self.config.initial_capital);
        let mut report = TradingReport::new(&self.config);
        let mut last_prices: HashMap<CurrencyPair, Decimal> = HashMap::new();

        info!(
            "Starting backtest: {} pairs, {} to {}, ${} capital, strategy {}",
            self.config.pairs.len(),
            self.config.start.format("%Y-%m-%d"),
            self.config.end.format("%Y-%m-%d"),
            self.config.initial_capital,
            self.strategy.name()
        );

        let pairs = self.config.pairs.clone();
        for pair in &pairs {
            if self.controller.is_cancelled() {
                return Err(Self::cancelled(&report));
            }

            info!("Fetching historical data for {}...", pair);
            let candles = self
                .data_source
                .fetch_candles(pair, self.config.start, self.config.end)
                .await
                .map_err(|source| TradingError::MarketData {
                    pair: pair.clone(),
                    source,
                })?;

            if candles.len() < self.config.long_window {
                warn!(
                    "Skipping {}: {} candles, need at least {}",
                    pair,
                    candles.len(),
                    self.config.long_window
                );
                continue;
            }

            info!("Replaying {} candles for {}", candles.len(), pair);
            self.replay(pair, candles, &mut report, &mut last_prices)?;
        }

        let equity = self.portfolio.total_equity(&last_prices);
        report.complete(equity)?;

        info!(
            "Backtest complete: {} signals ({} actionable), {} completed positions, final equity ${:.2}",
            report.signals().len(),
            report.actionable_signal_count(),
            report.completed_positions().len(),
            equity
        );

        Ok(report)
    }

    fn replay(
        &mut self,
        pair: &CurrencyPair,
        candles: Vec<Candle>,
        report: &mut TradingReport,
        last_prices: &mut HashMap<CurrencyPair, Decimal>,
    ) -> Result<(), TradingError> {
        let mut buffer = CandleBuffer::new(self.config.long_window);

        for candle in candles {
            if self.controller.is_cancelled() {
                return Err(Self::cancelled(report));
            }

            last_prices.insert(pair.clone(), candle.close);
            buffer.push(candle);
            if buffer.len() < self.config.long_window {
                continue;
            }

            let open_position = self.portfolio.get_open_position(pair);
            let signal = self
                .strategy
                .generate(pair, buffer.as_slice(), &self.config, open_position)?;
            report.record_signal(signal.clone());

            if !signal.is_actionable() {
                continue;
            }

            match signal.action {
                TradeAction::Buy | TradeAction::Sell => {
                    let quantity = self.risk_manager.calculate_position_size(
                        self.portfolio.cash(),
                        signal.price,
                        self.config.risk_per_trade,
                    );
                    if let Some(position) = self.portfolio.open_position(&signal, quantity) {
                        report.record_position_outcome(position);
                    }
                }
                TradeAction::Close => {
                    if let Some(position) = self.portfolio.close_position(&signal)? {
                        report.record_position_outcome(position);
                    }
                }
                TradeAction::Hold => {}
            }
        }

        debug!(
            "[{}] Replay done: cash ${:.2}, {} open positions",
            pair,
            self.portfolio.cash(),
            self.portfolio.open_position_count()
        );

        Ok(())
    }

    fn cancelled(report: &TradingReport) -> TradingError {
        warn!("Backtest cancelled after {} signals", report.signals().len());
        TradingError::Cancelled {
            report: Box::new(report.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryMarketDataSource, MockMarketDataSource};
    use crate::types::{Position, TradeSignal};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use mockall::predicate::{always, eq};
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    fn candle_at(i: usize, price: Decimal) -> Candle {
        Candle::new(
            start() + Duration::hours(i as i64),
            price,
            price + dec!(0.0005),
            price - dec!(0.0005),
            price,
            dec!(1000),
        )
    }

    /// Rising series that flips direction every 30 bars.
    fn trending_series(start_price: Decimal, step: Decimal, count: usize) -> Vec<Candle> {
        let mut price = start_price;
        let mut step = step;
        let mut candles = Vec::with_capacity(count);
        for i in 0..count {
            price += step;
            candles.push(candle_at(i, price));
            if i % 30 == 0 && i != 0 {
                step = -step;
            }
        }
        candles
    }

    fn flat_series(price: Decimal, count: usize) -> Vec<Candle> {
        (0..count).map(|i| candle_at(i, price)).collect()
    }

    fn config(pairs: Vec<CurrencyPair>, candles: &[Candle]) -> TradingConfig {
        TradingConfig {
            pairs,
            start: candles.first().map(|c| c.timestamp).unwrap(),
            end: candles.last().map(|c| c.timestamp).unwrap(),
            initial_capital: dec!(1000),
            risk_per_trade: dec!(0.2),
            short_window: 5,
            long_window: 20,
            stop_loss_factor: dec!(0.01),
            take_profit_factor: dec!(0.02),
            ..TradingConfig::default()
        }
    }

    fn usdaud() -> CurrencyPair {
        CurrencyPair::new("USD", "AUD")
    }

    fn eurusd() -> CurrencyPair {
        CurrencyPair::new("EUR", "USD")
    }

    fn engine(config: TradingConfig, source: InMemoryMarketDataSource) -> BacktestEngine {
        BacktestEngine::new(config, Arc::new(source)).unwrap()
    }

    #[tokio::test]
    async fn test_trending_market_produces_entries() {
        let candles = trending_series(dec!(0.65), dec!(0.005), 120);
        let cfg = config(vec![usdaud()], &candles);
        let source = InMemoryMarketDataSource::new().with_pair(usdaud(), candles);

        let report = engine(cfg, source).run().await.unwrap();

        // one signal per candle from the long_window-th onwards
        assert_eq!(report.signals().len(), 101);
        assert!(report
            .signals()
            .iter()
            .any(|s| matches!(s.action, TradeAction::Buy | TradeAction::Sell)));
        assert!(report.is_complete());
        assert!(report.final_equity().unwrap() >= Decimal::ZERO);
        assert!(report.completed_positions().iter().all(|p| !p.is_open()));
    }

    #[tokio::test]
    async fn test_flat_market_only_holds() {
        let candles = flat_series(dec!(0.75), 120);
        let cfg = config(vec![usdaud()], &candles);
        let source = InMemoryMarketDataSource::new().with_pair(usdaud(), candles);

        let mut engine = engine(cfg, source);
        let report = engine.run().await.unwrap();

        assert!(!report.signals().is_empty());
        assert!(report.signals().iter().all(|s| s.action == TradeAction::Hold));
        assert_eq!(report.final_equity(), Some(dec!(1000)));
        assert!(engine.portfolio().positions().is_empty());
        assert!(report.completed_positions().is_empty());
    }

    #[tokio::test]
    async fn test_short_history_pair_is_skipped_without_side_effects() {
        let candles = trending_series(dec!(0.65), dec!(0.005), 120);
        let short_history = trending_series(dec!(1.10), dec!(0.002), 10);

        let both = InMemoryMarketDataSource::new()
            .with_pair(eurusd(), short_history)
            .with_pair(usdaud(), candles.clone());
        let with_short = engine(config(vec![eurusd(), usdaud()], &candles), both)
            .run()
            .await
            .unwrap();

        let alone = InMemoryMarketDataSource::new().with_pair(usdaud(), candles.clone());
        let baseline = engine(config(vec![usdaud()], &candles), alone)
            .run()
            .await
            .unwrap();

        assert!(with_short.signals().iter().all(|s| s.pair != eurusd()));
        assert_eq!(with_short.signals(), baseline.signals());
        assert_eq!(with_short.final_equity(), baseline.final_equity());
    }

    #[tokio::test]
    async fn test_runs_are_deterministic_and_start_fresh() {
        let candles = trending_series(dec!(0.65), dec!(0.005), 120);
        let cfg = config(vec![usdaud()], &candles);
        let source = InMemoryMarketDataSource::new().with_pair(usdaud(), candles);

        let mut engine = engine(cfg, source);
        let first = engine.run().await.unwrap();
        let first_positions = engine.portfolio().positions().len();
        let second = engine.run().await.unwrap();

        assert_eq!(first.signals(), second.signals());
        assert_eq!(first.final_equity(), second.final_equity());
        assert_eq!(first.completed_positions().len(), second.completed_positions().len());
        assert_eq!(engine.portfolio().positions().len(), first_positions);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let cfg = TradingConfig {
            short_window: 20,
            long_window: 5,
            ..TradingConfig::default()
        };
        let result = BacktestEngine::new(cfg, Arc::new(InMemoryMarketDataSource::new()));
        match result {
            Err(TradingError::InvalidConfig(errors)) => {
                assert_eq!(errors, vec!["short_window must be < long_window".to_string()]);
            }
            _ => panic!("expected InvalidConfig"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_run_returns_partial_report() {
        let candles = trending_series(dec!(0.65), dec!(0.005), 120);
        let cfg = config(vec![usdaud()], &candles);
        let source = InMemoryMarketDataSource::new().with_pair(usdaud(), candles);

        let controller = RunController::new();
        controller.cancel();
        let mut engine = engine(cfg, source).with_controller(controller);

        match engine.run().await {
            Err(TradingError::Cancelled { report }) => {
                assert!(!report.is_complete());
                assert!(report.signals().is_empty());
            }
            other => panic!("expected Cancelled, got {:?}", other.map(|r| r.signals().len())),
        }
    }

    #[tokio::test]
    async fn test_cancel_during_fetch_stops_before_replay() {
        let candles = trending_series(dec!(0.65), dec!(0.005), 120);
        let cfg = config(vec![usdaud(), eurusd()], &candles);

        let controller = RunController::new();
        let handle = controller.clone();
        let served = candles.clone();

        let mut source = MockMarketDataSource::new();
        source
            .expect_fetch_candles()
            .with(eq(usdaud()), always(), always())
            .times(1)
            .returning(move |_, _, _| {
                handle.cancel();
                Ok(served.clone())
            });
        source.expect_fetch_candles().with(eq(eurusd()), always(), always()).never();

        let mut engine = BacktestEngine::new(cfg, Arc::new(source))
            .unwrap()
            .with_controller(controller);

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, TradingError::Cancelled { ref report } if report.signals().is_empty()));
        assert!(engine.portfolio().positions().is_empty());
    }

    #[tokio::test]
    async fn test_fetches_each_pair_once_in_order() {
        let candles = flat_series(dec!(1.1), 40);
        let cfg = config(vec![eurusd(), usdaud()], &candles);
        let (start, end) = (cfg.start, cfg.end);

        let mut seq = mockall::Sequence::new();
        let mut source = MockMarketDataSource::new();
        let served = candles.clone();
        source
            .expect_fetch_candles()
            .with(eq(eurusd()), eq(start), eq(end))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _| Ok(served.clone()));
        source
            .expect_fetch_candles()
            .with(eq(usdaud()), eq(start), eq(end))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(Vec::new()));

        let mut engine = BacktestEngine::new(cfg, Arc::new(source)).unwrap();
        let report = engine.run().await.unwrap();

        assert_eq!(report.signals().len(), 21);
        assert!(report.signals().iter().all(|s| s.pair == eurusd()));
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_run() {
        let candles = flat_series(dec!(1.1), 40);
        let cfg = config(vec![eurusd()], &candles);

        let mut source = MockMarketDataSource::new();
        source
            .expect_fetch_candles()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset")));

        let mut engine = BacktestEngine::new(cfg, Arc::new(source)).unwrap();
        match engine.run().await {
            Err(TradingError::MarketData { pair, source }) => {
                assert_eq!(pair, eurusd());
                assert_eq!(source.to_string(), "connection reset");
            }
            _ => panic!("expected MarketData error"),
        }
    }

    struct AlwaysBuy;

    impl Strategy for AlwaysBuy {
        fn name(&self) -> &str {
            "always_buy"
        }

        fn generate(
            &self,
            pair: &CurrencyPair,
            candles: &[Candle],
            _config: &TradingConfig,
            _open_position: Option<&Position>,
        ) -> Result<TradeSignal, TradingError> {
            let latest = candles.last().ok_or(TradingError::EmptyCandles)?;
            Ok(TradeSignal::new(
                pair.clone(),
                TradeAction::Buy,
                latest.timestamp,
                latest.close,
                Decimal::ONE,
                "always buy",
            ))
        }
    }

    #[tokio::test]
    async fn test_sizing_uses_current_cash() {
        let candles = flat_series(dec!(2), 30);
        let cfg = TradingConfig {
            risk_per_trade: dec!(0.5),
            ..config(vec![eurusd(), usdaud()], &candles)
        };
        let source = InMemoryMarketDataSource::new()
            .with_pair(eurusd(), candles.clone())
            .with_pair(usdaud(), candles);

        let mut engine = engine(cfg, source).with_strategy(Box::new(AlwaysBuy));
        let report = engine.run().await.unwrap();

        let positions = engine.portfolio().positions();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].quantity, dec!(250));
        assert_eq!(positions[1].quantity, dec!(125));
        assert_eq!(engine.portfolio().cash(), dec!(250));
        // open positions are marked at the last close
        assert_eq!(report.final_equity(), Some(dec!(1000)));
        assert!(report.completed_positions().is_empty());
    }
}
