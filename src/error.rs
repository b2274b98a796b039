// Contract errors
//
// Only the factory can reject a call (index out of range). The remaining
// variants belong to the host: address parsing, persistence, config.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("index {index} out of bounds for registry of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("chain changed since it was loaded: expected {expected} stored events, found {found}")]
    StaleState { expected: usize, found: usize },

    #[error("invalid stored value: {0}")]
    InvalidValue(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ContractError>;

impl ContractError {
    /// True for errors caused by the caller's arguments rather than the host
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ContractError::IndexOutOfBounds { .. } | ContractError::InvalidAddress(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_message() {
        let err = ContractError::IndexOutOfBounds { index: 3, len: 2 };
        assert_eq!(
            err.to_string(),
            "index 3 out of bounds for registry of length 2"
        );
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_host_errors_are_not_caller_errors() {
        let err = ContractError::Config("missing".to_string());
        assert!(!err.is_caller_error());

        let err = ContractError::StaleState { expected: 4, found: 6 };
        assert!(!err.is_caller_error());
        assert!(err.to_string().contains("expected 4"));
    }
}
