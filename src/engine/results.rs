use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::TradingConfig;
use crate::error::TradingError;
use crate::types::{Position, TradeSignal};

/// Accumulated output of one backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct TradingReport {
    // Run parameters
    pub initial_capital: Decimal,
    pub target_profit: Decimal,
    pub target_horizon_hours: u32,
    pub generated_at: DateTime<Utc>,

    // Accumulated during the run
    signals: Vec<TradeSignal>,
    completed_positions: Vec<Position>,
    final_equity: Option<Decimal>,
}

impl TradingReport {
    pub fn new(config: &TradingConfig) -> Self {
        Self {
            initial_capital: config.initial_capital,
            target_profit: config.target_profit,
            target_horizon_hours: config.target_horizon_hours,
            generated_at: Utc::now(),
            signals: Vec::new(),
            completed_positions: Vec::new(),
            final_equity: None,
        }
    }

    /// Every signal the strategy produced, in generation order.
    pub fn signals(&self) -> &[TradeSignal] {
        &self.signals
    }

    pub fn completed_positions(&self) -> &[Position] {
        &self.completed_positions
    }

    /// `None` until the run completes.
    pub fn final_equity(&self) -> Option<Decimal> {
        self.final_equity
    }

    pub fn is_complete(&self) -> bool {
        self.final_equity.is_some()
    }

    pub fn record_signal(&mut self, signal: TradeSignal) {
        self.signals.push(signal);
    }

    /// Keeps a snapshot of the position if it has been closed. Positions that
    /// are still open are not completed and are ignored.
    pub fn record_position_outcome(&mut self, position: &Position) {
        if position.closed_at.is_some() {
            self.completed_positions.push(position.clone());
        }
    }

    pub fn complete(&mut self, final_equity: Decimal) -> Result<(), TradingError> {
        if self.final_equity.is_some() {
            return Err(TradingError::ReportAlreadyComplete);
        }
        self.final_equity = Some(final_equity);
        Ok(())
    }

    /// `final_equity - initial_capital >= target_profit`; false while incomplete.
    pub fn profit_target_achieved(&self) -> bool {
        self.final_equity
            .map(|equity| equity - self.initial_capital >= self.target_profit)
            .unwrap_or(false)
    }

    pub fn total_realized_profit(&self) -> Decimal {
        self.completed_positions
            .iter()
            .filter_map(|p| p.realized_pnl())
            .sum()
    }

    pub fn actionable_signal_count(&self) -> usize {
        self.signals.iter().filter(|s| s.is_actionable()).count()
    }

    /// Pretty print the report to the console
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("                    BACKTEST REPORT");
        println!("{}", "=".repeat(60));
        println!("Initial Capital:    ${:.2}", self.initial_capital);
        match self.final_equity {
            Some(equity) => {
                println!("Final Equity:       ${:.2}", equity);
                println!("Net Change:         ${:.2}", equity - self.initial_capital);
            }
            None => println!("Final Equity:       (run incomplete)"),
        }
        println!(
            "Profit Target:      ${:.2} within {}h ({})",
            self.target_profit,
            self.target_horizon_hours,
            if self.profit_target_achieved() { "achieved" } else { "not achieved" }
        );
        println!("{}", "-".repeat(60));
        println!("SIGNALS");
        println!("  Generated:          {}", self.signals.len());
        println!("  Actionable:         {}", self.actionable_signal_count());
        println!("{}", "-".repeat(60));
        println!("COMPLETED POSITIONS");
        println!("  Count:              {}", self.completed_positions.len());
        println!("  Realized P&L:       ${:.2}", self.total_realized_profit());
        for position in &self.completed_positions {
            println!(
                "  {} {} {:.4} @ {} -> {} ({:.4})",
                position.pair,
                position.direction,
                position.quantity,
                position.entry_price,
                position.exit_price.unwrap_or_default(),
                position.realized_pnl().unwrap_or_default()
            );
        }
        println!("{}", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurrencyPair, Direction, TradeAction};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn config() -> TradingConfig {
        TradingConfig {
            initial_capital: dec!(1000),
            target_profit: dec!(100),
            ..TradingConfig::default()
        }
    }

    fn position(entry: Decimal, quantity: Decimal) -> Position {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Position::new(CurrencyPair::new("EUR", "USD"), Direction::Long, entry, quantity, at).unwrap()
    }

    #[test]
    fn test_new_report_is_incomplete() {
        let report = TradingReport::new(&config());
        assert!(!report.is_complete());
        assert_eq!(report.final_equity(), None);
        assert!(!report.profit_target_achieved());
        assert_eq!(report.initial_capital, dec!(1000));
        assert_eq!(report.target_horizon_hours, 48);
    }

    #[test]
    fn test_complete_only_once() {
        let mut report = TradingReport::new(&config());
        report.complete(dec!(1050)).unwrap();
        assert_eq!(report.final_equity(), Some(dec!(1050)));

        let err = report.complete(dec!(2000)).unwrap_err();
        assert!(matches!(err, TradingError::ReportAlreadyComplete));
        assert_eq!(report.final_equity(), Some(dec!(1050)));
    }

    #[test]
    fn test_profit_target_threshold() {
        let mut reached = TradingReport::new(&config());
        reached.complete(dec!(1100)).unwrap();
        assert!(reached.profit_target_achieved());

        let mut missed = TradingReport::new(&config());
        missed.complete(dec!(1099.99)).unwrap();
        assert!(!missed.profit_target_achieved());
    }

    #[test]
    fn test_only_closed_positions_are_recorded() {
        let mut report = TradingReport::new(&config());
        let mut open = position(dec!(1.0), dec!(100));
        report.record_position_outcome(&open);
        assert!(report.completed_positions().is_empty());

        let closed_at = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        open.close(dec!(1.05), closed_at).unwrap();
        report.record_position_outcome(&open);

        let mut loser = position(dec!(1.0), dec!(10));
        loser.close(dec!(0.9), closed_at).unwrap();
        report.record_position_outcome(&loser);

        assert_eq!(report.completed_positions().len(), 2);
        assert_eq!(report.total_realized_profit(), dec!(4));
    }

    #[test]
    fn test_signal_counts() {
        let mut report = TradingReport::new(&config());
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let pair = CurrencyPair::new("EUR", "USD");
        for action in [TradeAction::Hold, TradeAction::Buy, TradeAction::Hold, TradeAction::Close] {
            report.record_signal(TradeSignal::new(pair.clone(), action, at, dec!(1.1), dec!(0.5), "test"));
        }
        report.record_signal(TradeSignal::new(pair, TradeAction::Sell, at, dec!(1.1), Decimal::ZERO, "test"));

        assert_eq!(report.signals().len(), 5);
        assert_eq!(report.signals()[1].action, TradeAction::Buy);
        assert_eq!(report.actionable_signal_count(), 2);
    }

    #[test]
    fn test_serializes_to_json() {
        let mut report = TradingReport::new(&config());
        report.complete(dec!(1000)).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["final_equity"], serde_json::json!("1000"));
        assert!(json["signals"].as_array().unwrap().is_empty());
    }
}
