use crate::payload::RepositoryName;
use abl_github::CanonicalCommit;
use time::UtcDateTime;

pub(crate) fn biology() -> RepositoryName {
    RepositoryName {
        owner: "openstax".to_string(),
        name: "biology".to_string(),
    }
}

/// The canonical `openstax/biology` repository (id 1) with one print book.
pub(crate) fn canonical_biology(hash: &str) -> CanonicalCommit {
    CanonicalCommit::new(1, hash, UtcDateTime::UNIX_EPOCH).with_book("biology", "print")
}
