use core_types::CoreError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Not enough cash available to execute trade. Required: {required}, Available: {available}")]
    InsufficientCash { required: Decimal, available: Decimal },

    #[error("Not enough shares of {symbol} to sell. Requested: {requested}, Available: {available}")]
    InsufficientShares {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Order rejected before execution: {0}")]
    InvalidOrder(#[from] CoreError),
}
