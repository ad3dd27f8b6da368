//! Error taxonomy for translation resolution.

use std::time::Duration;
use thiserror::Error;

/// Errors produced while resolving or caching translation bundles.
///
/// Only [`TranslationError::Configuration`] is meant to reach callers of the
/// language resolver. Everything else is recovered inside the cache by
/// falling back to cached or static data.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The operation exceeded its deadline. Never opens the circuit breaker.
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Query or connection failure in the data store.
    #[error("data store error: {0}")]
    DataStore(String),

    /// No usable language configuration exists.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A persisted bundle snapshot could not be (de)serialized.
    #[error("bundle snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Key definitions failed validation.
    #[error("invalid translation definitions: {0}")]
    Rejected(String),
}

impl TranslationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TranslationError::Timeout { .. })
    }

    /// Whether this failure should open the circuit breaker.
    ///
    /// Only hard data-store failures count. A slow database is still alive,
    /// and configuration or snapshot problems say nothing about availability.
    pub fn opens_breaker(&self) -> bool {
        matches!(self, TranslationError::DataStore(_))
    }
}

impl From<sqlx::Error> for TranslationError {
    fn from(err: sqlx::Error) -> Self {
        TranslationError::DataStore(err.to_string())
    }
}

pub type TranslationResult<T> = Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_does_not_open_breaker() {
        let err = TranslationError::Timeout {
            operation: "bundle load",
            after: Duration::from_millis(1500),
        };
        assert!(err.is_timeout());
        assert!(!err.opens_breaker());
        assert_eq!(err.to_string(), "bundle load timed out after 1500ms");
    }

    #[test]
    fn test_data_store_error_opens_breaker() {
        let err = TranslationError::DataStore("connection refused".to_string());
        assert!(!err.is_timeout());
        assert!(err.opens_breaker());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_configuration_error_does_not_open_breaker() {
        let err = TranslationError::Configuration("no active languages".to_string());
        assert!(!err.is_timeout());
        assert!(!err.opens_breaker());
    }

    #[test]
    fn test_sqlx_error_converts_to_data_store() {
        let err: TranslationError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, TranslationError::DataStore(_)));
    }
}
