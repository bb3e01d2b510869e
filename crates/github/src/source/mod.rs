//! Metadata source trait and implementations.

mod github;
#[cfg(feature = "mock")]
mod mock;

pub use self::github::{DEFAULT_ENDPOINT, GitHubOptions, GitHubSource};
#[cfg(feature = "mock")]
pub use self::mock::MockSource;
use crate::error::Result;
use crate::models::CanonicalCommit;
use async_trait::async_trait;

/// Fetch capability for canonical commit metadata.
///
/// Implementations perform no throttling of their own. Callers are expected
/// to gate every call (the reconciliation does so with a shared rate limiter),
/// and to treat any error as a failure of the work item that needed the data
/// rather than of the whole run.
///
/// # Examples
///
/// ```
/// use abl_github::{MetadataSource, error::Result};
///
/// async fn book_slugs(source: &dyn MetadataSource) -> Result<Vec<String>> {
///     let commit = source.fetch("osbooks-biology", "openstax", "4d6ee4f").await?;
///     Ok(commit.books.into_iter().map(|book| book.slug).collect())
/// }
/// ```
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Name of the source (used for logging only).
    fn name(&self) -> &str;

    /// Fetch the canonical metadata for `commit` of the repository
    /// `owner/name`.
    ///
    /// `commit` is any expression the source can resolve to a commit (usually
    /// a full or abbreviated hash); the returned
    /// [`hash`](CanonicalCommit::hash) is always the full canonical hash.
    async fn fetch(&self, name: &str, owner: &str, commit: &str) -> Result<CanonicalCommit>;
}
