use rust_decimal::Decimal;
use thiserror::Error;

use crate::engine::TradingReport;
use crate::types::{CurrencyPair, TradeAction};

/// Errors surfaced by the analytics and execution pipeline.
///
/// Benign strategy conditions (duplicate entries, empty closes, undersized
/// orders) are not errors; they show up as `None` results instead.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("historical candles are required to generate a signal")]
    EmptyCandles,

    #[error("positions must be long or short, got {0}")]
    InvalidDirection(TradeAction),

    #[error("position quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("position {0} is already closed")]
    PositionAlreadyClosed(String),

    #[error("invalid currency pair '{0}', expected BASE/QUOTE")]
    InvalidPair(String),

    #[error("invalid configuration: {}", .0.join(", "))]
    InvalidConfig(Vec<String>),

    #[error("report has already been completed")]
    ReportAlreadyComplete,

    #[error("failed to fetch market data for {pair}")]
    MarketData {
        pair: CurrencyPair,
        #[source]
        source: anyhow::Error,
    },

    /// The run was cancelled. The partial report is never complete.
    #[error("backtest cancelled after {} signals", .report.signals().len())]
    Cancelled { report: Box<TradingReport> },
}
