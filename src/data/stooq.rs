use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{Candle, CurrencyPair};
use super::MarketDataSource;

const STOOQ_BASE_URL: &str = "https://stooq.com";
const USER_AGENT: &str = "fx-backtest/0.1";

/// Daily FX candles downloaded as CSV from stooq.com.
#[derive(Debug, Clone)]
pub struct StooqDataSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StooqRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: String,
    #[serde(rename = "High")]
    high: String,
    #[serde(rename = "Low")]
    low: String,
    #[serde(rename = "Close")]
    close: String,
    #[serde(rename = "Volume", default)]
    volume: Option<String>,
}

impl StooqRow {
    fn into_candle(self) -> Option<Candle> {
        let day = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()?;
        let timestamp = day.and_time(NaiveTime::MIN).and_utc();
        let volume = match self.volume.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Decimal::from_str(v).ok()?,
            _ => Decimal::ZERO,
        };

        Some(Candle::new(
            timestamp,
            Decimal::from_str(self.open.trim()).ok()?,
            Decimal::from_str(self.high.trim()).ok()?,
            Decimal::from_str(self.low.trim()).ok()?,
            Decimal::from_str(self.close.trim()).ok()?,
            volume,
        ))
    }
}

impl StooqDataSource {
    pub fn new() -> Self {
        Self::with_base_url(STOOQ_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Stooq symbol for a pair, e.g. `eurusd`.
    pub fn symbol(pair: &CurrencyPair) -> String {
        format!("{}{}", pair.base_currency(), pair.quote_currency()).to_lowercase()
    }

    pub fn download_url(&self, pair: &CurrencyPair) -> String {
        format!("{}/q/d/l/?s={}&i=d", self.base_url, Self::symbol(pair))
    }
}

impl Default for StooqDataSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a Stooq daily CSV body, skipping rows that do not parse and rows
/// outside `[start, end]`. The result is sorted by timestamp.
pub fn parse_csv(body: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Candle> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut skipped = 0usize;
    let mut candles: Vec<Candle> = reader
        .deserialize::<StooqRow>()
        .filter_map(|row| {
            let candle = row.ok().and_then(StooqRow::into_candle);
            if candle.is_none() {
                skipped += 1;
            }
            candle
        })
        .filter(|c| c.timestamp >= start && c.timestamp <= end)
        .collect();

    if skipped > 0 {
        debug!("Skipped {} unparseable Stooq rows", skipped);
    }

    candles.sort_by_key(|c| c.timestamp);
    candles
}

#[async_trait]
impl MarketDataSource for StooqDataSource {
    async fn fetch_candles(
        &self,
        pair: &CurrencyPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        if start >= end {
            return Err(anyhow!("start {} must be before end {}", start, end));
        }

        let url = self.download_url(pair);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Stooq returned {} for {}: {}", status, pair, body));
        }

        let body = response.text().await?;
        let candles = parse_csv(&body, start, end);
        info!("Fetched {} daily candles for {} from Stooq", candles.len(), pair);
        Ok(candles)
    }
}
