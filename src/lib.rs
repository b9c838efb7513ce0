//! Monthly solar production and energy balance forecasting.
//!
//! Loads a semicolon-delimited table of monthly inverter production and grid
//! exchange, fills gaps, derives total production and net balance, explores
//! the seasonal structure and forecasts twelve months ahead with automatic
//! ARIMA, three Holt-Winters variants and a neural-network autoregression.

pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod pipeline;
pub mod report;
pub mod telemetry;

pub use error::{ForecastError, Result};
