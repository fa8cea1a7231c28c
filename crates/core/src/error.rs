use thiserror::Error;

pub type ShopdashResult<T> = Result<T, ShopdashError>;

#[derive(Error, Debug)]
pub enum ShopdashError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache backend error: {0}")]
    Cache(String),

    #[error("Lock backend error: {0}")]
    Lock(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ShopdashError::NotFound("product 42".into());
        assert_eq!(err.to_string(), "Not found: product 42");

        let err = ShopdashError::Lock("lease no longer held".into());
        assert_eq!(err.to_string(), "Lock backend error: lease no longer held");
    }

    #[test]
    fn test_serde_error_converts() {
        let parse: Result<u32, _> = serde_json::from_str("not json");
        let err: ShopdashError = parse.unwrap_err().into();
        assert!(matches!(err, ShopdashError::Serialization(_)));
    }
}
