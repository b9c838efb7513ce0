use thiserror::Error;

/// Errors raised by the forecasting pipeline.
///
/// Every error aborts the run; there is no retry or partial-failure mode.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("Insufficient data for {context}: need at least {needed} observations, got {got}")]
    InsufficientData {
        context: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("Model fit error: {0}")]
    ModelFit(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForecastError {
    pub fn parse(line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn insufficient(context: &'static str, needed: usize, got: usize) -> Self {
        Self::InsufficientData {
            context,
            needed,
            got,
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
