//! Metadata Source Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A metadata source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata source operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The HTTP client could not be constructed.
    #[display("HTTP client configuration error")]
    Client,
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[display("network error")]
    Network,
    /// The remote API responded with a non-success status code.
    #[display("unexpected HTTP status: {_0}")]
    Status(#[error(not(source))] u16),
    /// The API answered, but reported errors for the query.
    #[display("API error: {_0}")]
    Api(#[error(not(source))] String),
    /// The response body did not have the expected shape.
    #[display("invalid API response: {_0}")]
    InvalidResponse(#[error(not(source))] &'static str),
    #[display("repository not found: {_0}")]
    RepositoryNotFound(#[error(not(source))] String),
    #[display("commit not found: {_0}")]
    CommitNotFound(#[error(not(source))] String),
    /// The commit exists but does not contain a book manifest.
    #[display("book manifest not found at commit: {_0}")]
    ManifestMissing(#[error(not(source))] String),
    /// The book manifest exists but a book entry is incomplete.
    #[display("invalid book manifest: {_0}")]
    InvalidManifest(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network => true,
            Self::Status(status) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
