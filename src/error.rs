//! Error types for the refresh pipeline and startup configuration.

use std::time::Duration;
use thiserror::Error;

/// Failure talking to the advisory API.
#[derive(Debug, Clone, Error)]
pub enum AdvisorError {
    /// Transport or service error reported by the API client.
    #[error("advisory API call failed: {0}")]
    Api(String),

    /// The call did not complete within the configured deadline.
    #[error("advisory API call timed out after {0:?}")]
    Timeout(Duration),

    /// The API answered with a status outside the known set.
    #[error("unknown check status '{0}'")]
    UnknownStatus(String),

    /// The API answered but carried no result for the check.
    #[error("no result returned for check {0}")]
    MissingResult(String),
}

impl AdvisorError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdvisorError::Api(_) | AdvisorError::Timeout(_))
    }
}

/// Invalid process configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid listen address '{addr}': {source}")]
    ListenAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("refresh period must be at least one second")]
    ZeroRefreshPeriod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AdvisorError::Api("throttled".into()).is_retryable());
        assert!(AdvisorError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(!AdvisorError::UnknownStatus("purple".into()).is_retryable());
        assert!(!AdvisorError::MissingResult("abc".into()).is_retryable());
    }
}
