use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Prices below this are treated as this value when sizing, so a zero or
/// negative quote can never divide by zero.
pub const MIN_SIZING_PRICE: Decimal = dec!(0.0001);

/// Converts available capital into an order quantity.
#[derive(Debug, Clone, Default)]
pub struct RiskManager;

impl RiskManager {
    pub fn new() -> Self {
        Self
    }

    /// `capital * risk_fraction / price`, never negative. Non-positive
    /// capital sizes to zero.
    pub fn calculate_position_size(
        &self,
        available_capital: Decimal,
        price: Decimal,
        risk_fraction: Decimal,
    ) -> Decimal {
        if available_capital <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let capital_at_risk = available_capital * risk_fraction;
        (capital_at_risk / price.max(MIN_SIZING_PRICE)).max(Decimal::ZERO)
    }
}
