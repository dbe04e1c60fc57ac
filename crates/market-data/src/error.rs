use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error while reading market data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column '{column}' is missing from {file}")]
    MissingColumn { file: PathBuf, column: String },

    #[error("No data available for {0}")]
    NoData(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}
