use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Backtest setup is invalid: {0}")]
    Validation(String),

    #[error("Market data error: {0}")]
    Data(#[from] market_data::DataError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("Configuration error: {0}")]
    Config(#[from] configuration::ConfigError),

    #[error("Failed to serialize results: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error while writing results: {0}")]
    Io(#[from] std::io::Error),

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),
}

impl From<indicatif::style::TemplateError> for BacktestError {
    fn from(error: indicatif::style::TemplateError) -> Self {
        BacktestError::ProgressBarTemplate(error.to_string())
    }
}
