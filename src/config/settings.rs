use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::CurrencyPair;

pub const ENV_PREFIX: &str = "FX_BACKTEST";

/// Run parameters for one backtest. Every field has a default, so a config
/// file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub initial_capital: Decimal,
    pub target_profit: Decimal,
    pub target_horizon_hours: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub pairs: Vec<CurrencyPair>,
    pub risk_per_trade: Decimal,   // Fraction of cash committed per entry (0.01 = 1%)
    pub short_window: usize,
    pub long_window: usize,
    pub stop_loss_factor: Decimal,   // 0.005 = 0.5% below entry for longs
    pub take_profit_factor: Decimal, // 0.01 = 1% above entry for longs
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100),
            target_profit: dec!(2500),
            target_horizon_hours: 48,
            start: NaiveDate::from_ymd_opt(1980, 1, 1)
                .unwrap_or_default()
                .and_time(NaiveTime::MIN)
                .and_utc(),
            end: Utc::now(),
            pairs: vec![
                CurrencyPair::new("USD", "AUD"),
                CurrencyPair::new("EUR", "USD"),
                CurrencyPair::new("GBP", "USD"),
                CurrencyPair::new("USD", "JPY"),
            ],
            risk_per_trade: dec!(0.01),
            short_window: 12,
            long_window: 48,
            stop_loss_factor: dec!(0.005),
            take_profit_factor: dec!(0.01),
        }
    }
}

impl TradingConfig {
    /// Layers an optional TOML file and `FX_BACKTEST_*` environment variables
    /// over the defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("pairs"),
            )
            .build()?;

        let config: TradingConfig = settings.try_deserialize()?;
        debug!("Loaded configuration from {} (+{}_* env)", path, ENV_PREFIX);
        Ok(config)
    }

    pub fn target_horizon(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.target_horizon_hours))
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.initial_capital <= Decimal::ZERO {
            errors.push("initial_capital must be > 0".to_string());
        }
        if self.target_profit < Decimal::ZERO {
            errors.push("target_profit must be >= 0".to_string());
        }
        if self.risk_per_trade <= Decimal::ZERO || self.risk_per_trade > Decimal::ONE {
            errors.push("risk_per_trade must be between 0 and 1".to_string());
        }

        // Windows
        if self.short_window == 0 {
            errors.push("short_window must be > 0".to_string());
        }
        if self.long_window == 0 {
            errors.push("long_window must be > 0".to_string());
        }
        if self.short_window >= self.long_window {
            errors.push("short_window must be < long_window".to_string());
        }

        if self.stop_loss_factor <= Decimal::ZERO {
            errors.push("stop_loss_factor must be > 0".to_string());
        }
        if self.take_profit_factor <= Decimal::ZERO {
            errors.push("take_profit_factor must be > 0".to_string());
        }

        if self.start >= self.end {
            errors.push("start must be before end".to_string());
        }
        if self.pairs.is_empty() {
            errors.push("pairs must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
