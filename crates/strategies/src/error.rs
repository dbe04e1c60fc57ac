use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("Strategy received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Strategy of type '{0}' not found or implemented")]
    StrategyNotFound(String),
}
