use rust_decimal::{Decimal, MathematicalOps};

pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().sum();
    Some(sum / Decimal::from(values.len()))
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn population_std_dev(values: &[Decimal]) -> Option<Decimal> {
    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|v| {
            let diff = *v - mean;
            diff * diff
        })
        .sum::<Decimal>()
        / Decimal::from(values.len());

    variance.sqrt()
}
