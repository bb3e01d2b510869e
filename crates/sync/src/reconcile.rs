use crate::error::{ErrorKind, Result};
use crate::limiter::ThrottledSource;
use crate::payload::{DeclaredVersion, RepositoryName};
use crate::resolve::resolve;
use crate::validate::{Insertion, Mismatch, add_books, check};
use abl_github::CanonicalCommit;
use abl_store::UnitOfWork;
use exn::ResultExt;
use tracing::instrument;

/// What reconciling one declared version did to the mirror.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VersionOutcome {
    /// The commit was already stored with the declared number of books; no
    /// fetch was made and nothing was written.
    Skipped,
    /// A new commit was recorded along with its books.
    Created { inserted: usize, suppressed: usize },
    /// An existing commit was given the books it was missing.
    Extended { inserted: usize, suppressed: usize },
    /// Some declared books are not in the canonical manifest. Nothing was
    /// written for this version and the remaining versions of the entry must
    /// not be processed.
    Mismatch(Mismatch),
}

impl VersionOutcome {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch(_))
    }
}

/// Bring the mirror in line with one declared version of a repository.
///
/// 1. **Stored, same book count**: nothing to do, the remote source is not
///    contacted.
/// 2. **Stored, different book count**: the canonical manifest is fetched
///    and, once the declared books validate against it, the missing books are
///    attached to the existing commit.
/// 3. **Not stored**: the canonical commit is fetched and validated, then the
///    repository is resolved (created if needed) and the commit is recorded
///    with the *canonical* hash and timestamp before the books are attached.
///
/// Validation always happens before the first write, so a [`Mismatch`] leaves
/// the unit of work exactly as it was.
#[instrument(
    skip(uow, source, repository, version),
    fields(repository = %repository, edition = version.edition, commit = %version.commit_hash)
)]
pub async fn reconcile(
    uow: &mut UnitOfWork,
    source: &mut ThrottledSource<'_>,
    repository: &RepositoryName,
    version: &DeclaredVersion,
) -> Result<VersionOutcome> {
    let existing = uow.find_commit(&version.commit_hash).await.or_raise(|| ErrorKind::Store)?;
    if let Some(commit) = &existing
        && commit.books.len() == version.books.len()
    {
        tracing::debug!("Commit already reconciled");
        return Ok(VersionOutcome::Skipped);
    }

    let canonical = fetch(source, repository, &version.commit_hash).await?;
    if let Some(mismatch) = check(&canonical.hash, &version.books, &canonical.books) {
        tracing::warn!(
            unmatched = mismatch.unmatched.len(),
            canonical = mismatch.canonical.len(),
            "Declared books do not match the canonical manifest"
        );
        return Ok(VersionOutcome::Mismatch(mismatch));
    }

    let (mut commit, created) = match existing {
        Some(commit) => (commit, false),
        None => match uow.find_commit(&canonical.hash).await.or_raise(|| ErrorKind::Store)? {
            // The declared hash was an abbreviation of one that is already stored.
            Some(commit) => {
                tracing::debug!(canonical = %canonical.hash, "Declared hash resolves to a stored commit");
                (commit, false)
            },
            None => {
                let stored = resolve(uow, &repository.owner, &repository.name, canonical.repository_id).await?;
                let commit = uow
                    .add_commit(&stored, &canonical.hash, canonical.timestamp)
                    .await
                    .or_raise(|| ErrorKind::Store)?;
                (commit, true)
            },
        },
    };

    let insertion = add_books(uow, &mut commit, version.edition, &version.books).await?;
    tracing::info!(
        inserted = insertion.inserted,
        suppressed = insertion.suppressed,
        created,
        "Reconciled commit"
    );
    let Insertion { inserted, suppressed } = insertion;
    Ok(if created {
        VersionOutcome::Created { inserted, suppressed }
    } else {
        VersionOutcome::Extended { inserted, suppressed }
    })
}

async fn fetch(source: &mut ThrottledSource<'_>, repository: &RepositoryName, hash: &str) -> Result<CanonicalCommit> {
    source
        .fetch(&repository.name, &repository.owner, hash)
        .await
        .or_raise(|| ErrorKind::Fetch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateLimiter;
    use crate::payload::DeclaredBook;
    use crate::testing::{biology, canonical_biology};
    use abl_github::source::MockSource;
    use abl_store::{Book, Database};

    fn version(hash: &str, books: &[(&str, &str, &str)]) -> DeclaredVersion {
        DeclaredVersion {
            edition: 1,
            commit_hash: hash.to_string(),
            books: books.iter().map(|(u, s, st)| DeclaredBook::new(*u, *s, *st)).collect(),
        }
    }

    #[tokio::test]
    async fn test_new_commit_is_created_from_canonical_data() {
        let db = Database::connect_in_memory().await.unwrap();
        let mock = MockSource::default().with_commit("openstax", "biology", "abc", canonical_biology("abc"));
        let mut source = ThrottledSource::new(&mock, RateLimiter::default());
        let mut uow = db.begin(false).await.unwrap();

        let outcome = reconcile(&mut uow, &mut source, &biology(), &version("abc", &[("u1", "biology", "print")]))
            .await
            .unwrap();
        assert_eq!(outcome, VersionOutcome::Created { inserted: 1, suppressed: 0 });

        let commit = uow.find_commit("abc").await.unwrap().unwrap();
        assert_eq!(commit.repository_id, 1);
        assert_eq!(commit.books, vec![Book::new("u1", "biology", "print", 1)]);
        assert!(uow.find_repository("openstax", "biology").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_matching_book_count_skips_fetch() {
        let db = Database::connect_in_memory().await.unwrap();
        let mock = MockSource::default().with_commit("openstax", "biology", "abc", canonical_biology("abc"));
        let mut source = ThrottledSource::new(&mock, RateLimiter::default());
        let mut uow = db.begin(false).await.unwrap();
        let declared = version("abc", &[("u1", "biology", "print")]);

        reconcile(&mut uow, &mut source, &biology(), &declared).await.unwrap();
        let outcome = reconcile(&mut uow, &mut source, &biology(), &declared).await.unwrap();
        assert_eq!(outcome, VersionOutcome::Skipped);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_differing_book_count_extends_existing_commit() {
        let db = Database::connect_in_memory().await.unwrap();
        let canonical = canonical_biology("abc").with_book("biology-ap", "ap-biology");
        let mock = MockSource::default().with_commit("openstax", "biology", "abc", canonical);
        let mut source = ThrottledSource::new(&mock, RateLimiter::default());
        let mut uow = db.begin(false).await.unwrap();

        reconcile(&mut uow, &mut source, &biology(), &version("abc", &[("u1", "biology", "print")]))
            .await
            .unwrap();
        let both = version("abc", &[("u1", "biology", "print"), ("u2", "biology-ap", "ap-biology")]);
        let outcome = reconcile(&mut uow, &mut source, &biology(), &both).await.unwrap();
        assert_eq!(outcome, VersionOutcome::Extended { inserted: 1, suppressed: 1 });
        assert_eq!(mock.calls(), 2);
        assert_eq!(uow.find_commit("abc").await.unwrap().unwrap().books.len(), 2);
    }

    #[tokio::test]
    async fn test_mismatch_writes_nothing() {
        let db = Database::connect_in_memory().await.unwrap();
        let mock = MockSource::default().with_commit("openstax", "biology", "abc", canonical_biology("abc"));
        let mut source = ThrottledSource::new(&mock, RateLimiter::default());
        let mut uow = db.begin(false).await.unwrap();

        let outcome = reconcile(&mut uow, &mut source, &biology(), &version("abc", &[("u1", "biology", "digital")]))
            .await
            .unwrap();
        assert!(outcome.is_mismatch());
        assert!(uow.find_commit("abc").await.unwrap().is_none());
        assert!(uow.find_repository("openstax", "biology").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abbreviated_hash_reuses_stored_commit() {
        let db = Database::connect_in_memory().await.unwrap();
        let mock = MockSource::default()
            .with_commit("openstax", "biology", "abc123", canonical_biology("abc123"))
            .with_commit("openstax", "biology", "abc", canonical_biology("abc123"));
        let mut source = ThrottledSource::new(&mock, RateLimiter::default());
        let mut uow = db.begin(false).await.unwrap();

        reconcile(&mut uow, &mut source, &biology(), &version("abc123", &[("u1", "biology", "print")]))
            .await
            .unwrap();
        let outcome = reconcile(&mut uow, &mut source, &biology(), &version("abc", &[("u1", "biology", "print")]))
            .await
            .unwrap();
        assert_eq!(outcome, VersionOutcome::Extended { inserted: 0, suppressed: 1 });
    }

    #[tokio::test]
    async fn test_fetch_failure_is_raised() {
        let db = Database::connect_in_memory().await.unwrap();
        let mock = MockSource::default();
        let mut source = ThrottledSource::new(&mock, RateLimiter::default());
        let mut uow = db.begin(false).await.unwrap();

        let err = reconcile(&mut uow, &mut source, &biology(), &version("abc", &[("u1", "biology", "print")]))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Fetch));
    }
}
