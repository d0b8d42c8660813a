//! Error types shared by every source, aggregator and cache in the crate.
//!
//! [`Error`] is `Clone` because a single in-flight computation can be joined
//! by many callers and each of them receives the same outcome.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::ChainId;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while querying sources or combining their results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("No sources were specified")]
    NoSources,

    #[error("Chain with id {chain_id} not supported")]
    UnsupportedChain { chain_id: ChainId },

    #[error("Operation {operation} is not supported on chain with id {chain_id}")]
    UnsupportedOperation {
        operation: &'static str,
        chain_id: ChainId,
    },

    #[error("Chain with id {chain_id} cannot support the given requirements: {field} is required but never returned")]
    UnmetRequirements { chain_id: ChainId, field: String },

    #[error("Could not fetch {what} that met the given requirements")]
    RequirementsNotMet { what: &'static str },

    #[error("Operation timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Failed to {operation} on all sources ({})", FailureList(.failures))]
    AllSourcesFailed {
        operation: &'static str,
        failures: Vec<SourceFailure>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Data format error: {message}")]
    Format { message: String },

    #[error("Source returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Invalid duration '{input}'")]
    InvalidDuration { input: String },

    #[error("Background task failed: {message}")]
    TaskFailed { message: String },
}

/// A single source's failure, kept for diagnostics when every source failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub error: Error,
}

impl SourceFailure {
    pub fn new(source: impl Into<String>, error: Error) -> Self {
        Self {
            source: source.into(),
            error,
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.error)
    }
}

struct FailureList<'a>(&'a [SourceFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn all_sources_failed(operation: &'static str, failures: Vec<SourceFailure>) -> Self {
        Self::AllSourcesFailed {
            operation,
            failures,
        }
    }

    /// `true` for errors raised before any source was contacted.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::NoSources
                | Self::UnsupportedChain { .. }
                | Self::UnsupportedOperation { .. }
                | Self::UnmetRequirements { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::format(err.to_string());
        }
        match err.status() {
            Some(status) if status.as_u16() == 429 => Self::RateLimitExceeded,
            Some(status) => Self::HttpStatus {
                status: status.as_u16(),
            },
            None => Self::network(err.to_string()),
        }
    }
}

/// Errors raised while starting the binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Source(#[from] Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_sources_failed_lists_every_failure() {
        let err = Error::all_sources_failed(
            "calculate gas",
            vec![
                SourceFailure::new("etherscan", Error::HttpStatus { status: 503 }),
                SourceFailure::new("rpc", Error::Timeout { after: Duration::from_secs(1) }),
            ],
        );

        let message = err.to_string();
        assert!(message.starts_with("Failed to calculate gas on all sources"));
        assert!(message.contains("etherscan: Source returned HTTP 503"));
        assert!(message.contains("rpc: Operation timed out after 1s"));
    }

    #[test]
    fn unsupported_chain_names_the_chain() {
        let err = Error::UnsupportedChain { chain_id: 10 };
        assert_eq!(err.to_string(), "Chain with id 10 not supported");
        assert!(err.is_preflight());
    }

    #[test]
    fn runtime_errors_are_not_preflight() {
        assert!(!Error::RateLimitExceeded.is_preflight());
        assert!(!Error::network("connection reset").is_preflight());
    }
}
