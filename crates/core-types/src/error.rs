use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A field carried a value the domain cannot represent: (field, value).
    #[error("Invalid value for {0}: {1}")]
    InvalidInput(String, String),
}
