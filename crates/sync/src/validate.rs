//! Cross-checking declared books against the canonical manifest.

use crate::error::{ErrorKind, Result};
use crate::payload::DeclaredBook;
use abl_github::CanonicalBook;
use abl_store::{Book, Commit, UnitOfWork};
use exn::ResultExt;

/// A declared version whose books do not all appear in the canonical
/// manifest of its commit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mismatch {
    pub commit_hash: String,
    /// Declared books with no canonical `(slug, style)` counterpart.
    pub unmatched: Vec<DeclaredBook>,
    pub canonical: Vec<CanonicalBook>,
}

/// Returns `true` when every declared book has a canonical book with the same
/// slug and style. Uuid and edition play no part in the match.
pub fn validate(declared: &[DeclaredBook], canonical: &[CanonicalBook]) -> bool {
    unmatched(declared, canonical).next().is_none()
}

/// The declared books that have no canonical counterpart, in declared order.
pub fn unmatched<'a>(
    declared: &'a [DeclaredBook],
    canonical: &'a [CanonicalBook],
) -> impl Iterator<Item = &'a DeclaredBook> + 'a {
    declared.iter().filter(|book| !canonical.iter().any(|c| c.slug == book.slug && c.style == book.style))
}

pub(crate) fn check(commit_hash: &str, declared: &[DeclaredBook], canonical: &[CanonicalBook]) -> Option<Mismatch> {
    let unmatched: Vec<DeclaredBook> = unmatched(declared, canonical).cloned().collect();
    if unmatched.is_empty() {
        return None;
    }
    Some(Mismatch {
        commit_hash: commit_hash.to_string(),
        unmatched,
        canonical: canonical.to_vec(),
    })
}

/// Books written by [`add_books`], and those skipped because a book with the
/// same uuid was already attached to the commit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Insertion {
    pub inserted: usize,
    pub suppressed: usize,
}

/// Attach every declared book to `commit` under the given edition.
pub async fn add_books(
    uow: &mut UnitOfWork,
    commit: &mut Commit,
    edition: u32,
    declared: &[DeclaredBook],
) -> Result<Insertion> {
    let mut insertion = Insertion::default();
    for declared in declared {
        let book = Book::new(&declared.uuid, &declared.slug, &declared.style, edition);
        if uow.add_book(commit, book).await.or_raise(|| ErrorKind::Store)? {
            insertion.inserted += 1;
        } else {
            tracing::debug!(commit = %commit.hash, uuid = %declared.uuid, "Book already attached to commit");
            insertion.suppressed += 1;
        }
    }
    Ok(insertion)
}
