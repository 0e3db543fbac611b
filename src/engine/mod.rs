pub mod portfolio;
pub mod controller;
pub mod backtest;
pub mod results;

pub use portfolio::*;
pub use controller::*;
pub use backtest::*;
pub use results::*;
