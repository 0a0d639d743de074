//! Shared error type for the exchange
//!
//! Per-candidate failures never surface to callers; they are folded into
//! aggregate counters. Only store failures abort a workflow.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors raised by the exchange engine and its collaborators
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Network, rate-limit or unexpected status from the follow graph
    #[error("External call failed: {0}")]
    ExternalCallFailed(String),

    /// The acting member's stored credential was rejected by the follow graph
    #[error("Credential invalid: {0}")]
    CredentialInvalid(String),

    /// Persistence failure; aborts the current workflow
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// No member record for the identity
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// Whether this error must stop the surrounding batch.
    ///
    /// External failures are per-candidate misses; the batch moves on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::StoreUnavailable(_) | ExchangeError::Internal(_)
        )
    }
}

impl From<mongodb::error::Error> for ExchangeError {
    fn from(e: mongodb::error::Error) -> Self {
        ExchangeError::StoreUnavailable(e.to_string())
    }
}

impl From<bson::ser::Error> for ExchangeError {
    fn from(e: bson::ser::Error) -> Self {
        ExchangeError::StoreUnavailable(format!("BSON encode failed: {}", e))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        ExchangeError::ExternalCallFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_and_internal_are_fatal() {
        assert!(ExchangeError::StoreUnavailable("down".into()).is_fatal());
        assert!(ExchangeError::Internal("bug".into()).is_fatal());
        assert!(!ExchangeError::ExternalCallFailed("502".into()).is_fatal());
        assert!(!ExchangeError::CredentialInvalid("alice".into()).is_fatal());
        assert!(!ExchangeError::MemberNotFound("bob".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let e = ExchangeError::MemberNotFound("carol".into());
        assert_eq!(e.to_string(), "Member not found: carol");
    }
}
