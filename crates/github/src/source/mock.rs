//! In-memory metadata source for testing.

use crate::error::{ErrorKind, Result};
use crate::models::CanonicalCommit;
use crate::source::MetadataSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

type Key = (String, String, String);

enum Response {
    Commit(CanonicalCommit),
    Failure(ErrorKind),
}

/// In-memory metadata source for testing.
///
/// Responses are keyed by `(owner, name, commit)`. Unknown keys answer with
/// [`ErrorKind::CommitNotFound`]. Every call is counted (including failed
/// ones), so tests can assert on how often the remote source was consulted.
///
/// # Examples
///
/// ```
/// use abl_github::source::MockSource;
/// use abl_github::{CanonicalCommit, MetadataSource};
/// use time::UtcDateTime;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let commit = CanonicalCommit::new(1, "abc", UtcDateTime::UNIX_EPOCH).with_book("biology", "print");
/// let source = MockSource::default().with_commit("openstax", "biology", "abc", commit);
/// let fetched = source.fetch("biology", "openstax", "abc").await.unwrap();
/// assert_eq!(fetched.books.len(), 1);
/// assert_eq!(source.calls(), 1);
/// # }
/// ```
#[derive(Default)]
pub struct MockSource {
    responses: RwLock<HashMap<Key, Response>>,
    calls: AtomicUsize,
}

impl MockSource {
    fn key(owner: &str, name: &str, commit: &str) -> Key {
        (owner.to_string(), name.to_string(), commit.to_string())
    }

    /// Answer requests for `owner/name@commit` with `canonical`.
    pub fn with_commit(mut self, owner: &str, name: &str, commit: &str, canonical: CanonicalCommit) -> Self {
        self.responses.get_mut().insert(Self::key(owner, name, commit), Response::Commit(canonical));
        self
    }

    /// Answer requests for `owner/name@commit` with an error.
    pub fn with_failure(mut self, owner: &str, name: &str, commit: &str, kind: ErrorKind) -> Self {
        self.responses.get_mut().insert(Self::key(owner, name, commit), Response::Failure(kind));
        self
    }

    /// Replace (or add) the canonical answer for `owner/name@commit` after
    /// construction, e.g. to simulate the remote changing between runs.
    pub async fn set_commit(&self, owner: &str, name: &str, commit: &str, canonical: CanonicalCommit) {
        self.responses.write().await.insert(Self::key(owner, name, commit), Response::Commit(canonical));
    }

    /// Total number of fetches performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, name: &str, owner: &str, commit: &str) -> Result<CanonicalCommit> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.read().await.get(&Self::key(owner, name, commit)) {
            Some(Response::Commit(canonical)) => Ok(canonical.clone()),
            Some(Response::Failure(kind)) => Err(exn::Exn::from(kind.clone())),
            None => Err(exn::Exn::from(ErrorKind::CommitNotFound(commit.to_string()))),
        }
    }
}
