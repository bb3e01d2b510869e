//! Reconciliation Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the store and the
//! metadata source become children of these.

use derive_more::{Display, Error};

/// A reconciliation error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a reconciliation failure.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The approved book list document could not be parsed.
    #[display("invalid approved book list")]
    Payload,
    /// One approved entry is malformed; other entries are unaffected.
    #[display("invalid approved entry: {_0}")]
    InvalidEntry(#[error(not(source))] String),
    /// Fetching canonical metadata from the
    /// [metadata source](abl_github::MetadataSource) failed.
    #[display("canonical metadata fetch failed")]
    Fetch,
    /// A lookup or write in the [store](abl_store::UnitOfWork) failed.
    #[display("store operation failed")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Nothing in this crate retries on its own; this only informs reporting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch)
    }
}
