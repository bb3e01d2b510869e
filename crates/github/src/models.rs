use time::UtcDateTime;

/// A book entry from a commit's book manifest.
///
/// Only `slug` and `style` take part in reconciliation; anything else the
/// manifest carries is informational.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CanonicalBook {
    pub slug: String,
    pub style: String,
    pub href: Option<String>,
}
impl CanonicalBook {
    pub fn new(slug: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            style: style.into(),
            href: None,
        }
    }
}

/// Everything the remote source knows about one commit of one repository.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CanonicalCommit {
    /// Numeric identifier the remote source assigned to the repository.
    pub repository_id: u64,
    /// Full commit hash. May differ from the requested expression, e.g. when
    /// the request used an abbreviated hash.
    pub hash: String,
    pub timestamp: UtcDateTime,
    pub books: Vec<CanonicalBook>,
}
impl CanonicalCommit {
    pub fn new(repository_id: u64, hash: impl Into<String>, timestamp: UtcDateTime) -> Self {
        Self {
            repository_id,
            hash: hash.into(),
            timestamp,
            books: Vec::new(),
        }
    }

    pub fn with_book(mut self, slug: impl Into<String>, style: impl Into<String>) -> Self {
        self.books.push(CanonicalBook::new(slug, style));
        self
    }
}
