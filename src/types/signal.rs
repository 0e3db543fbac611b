use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CurrencyPair, TradeAction};

/// A trading decision for one pair at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub pair: CurrencyPair,
    pub action: TradeAction,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    /// In `[0, 1]`.
    pub confidence: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub reason: String,
}

impl TradeSignal {
    pub fn new(
        pair: CurrencyPair,
        action: TradeAction,
        timestamp: DateTime<Utc>,
        price: Decimal,
        confidence: Decimal,
        reason: &str,
    ) -> Self {
        Self {
            pair,
            action,
            timestamp,
            price,
            confidence,
            stop_loss: None,
            take_profit: None,
            reason: reason.to_string(),
        }
    }

    pub fn with_levels(mut self, stop_loss: Decimal, take_profit: Decimal) -> Self {
        self.stop_loss = Some(stop_loss);
        self.take_profit = Some(take_profit);
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.action != TradeAction::Hold && self.confidence > Decimal::ZERO
    }

    pub fn risk_reward_ratio(&self) -> Option<Decimal> {
        match (self.stop_loss, self.take_profit) {
            (Some(sl), Some(tp)) => {
                let risk = (self.price - sl).abs();
                let reward = (tp - self.price).abs();
                if risk.is_zero() {
                    None
                } else {
                    Some(reward / risk)
                }
            }
            _ => None,
        }
    }
}
