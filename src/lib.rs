pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod risk;
pub mod strategies;
pub mod types;

pub use error::TradingError;
