use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// A book as recorded against a specific commit.
///
/// The `(uuid, slug, style, edition)` tuple is fixed at creation; the mirror
/// never updates a book in place.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Book {
    pub uuid: String,
    pub slug: String,
    pub style: String,
    pub edition: u32,
}
impl Book {
    pub fn new(uuid: impl Into<String>, slug: impl Into<String>, style: impl Into<String>, edition: u32) -> Self {
        Self {
            uuid: uuid.into(),
            slug: slug.into(),
            style: style.into(),
            edition,
        }
    }
}

/// A content-addressed snapshot of a repository and the books recorded for it,
/// in insertion order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Commit {
    pub(crate) id: i64,
    pub repository_id: u64,
    pub hash: String,
    pub timestamp: UtcDateTime,
    pub books: Vec<Book>,
}
impl Commit {
    /// Whether a book with this uuid has already been recorded on the commit.
    pub fn has_book(&self, uuid: &str) -> bool {
        self.books.iter().any(|book| book.uuid == uuid)
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommitRow {
    pub(crate) id: i64,
    pub(crate) repository_id: i64,
    pub(crate) hash: String,
    pub(crate) timestamp: i64,
}
impl CommitRow {
    pub(crate) fn into_model(self, books: Vec<BookRow>) -> Result<Commit, Error> {
        Ok(Commit {
            id: self.id,
            repository_id: u64::try_from(self.repository_id).or_raise(|| ErrorKind::InvalidData("repository id"))?,
            hash: self.hash,
            timestamp: UtcDateTime::from_unix_timestamp(self.timestamp)
                .or_raise(|| ErrorKind::InvalidData("commit timestamp"))?,
            books: books.into_iter().map(Book::try_from).collect::<Result<Vec<_>, _>>()?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub(crate) uuid: String,
    pub(crate) slug: String,
    pub(crate) style: String,
    pub(crate) edition: i64,
}
impl From<&Book> for BookRow {
    fn from(book: &Book) -> Self {
        Self {
            uuid: book.uuid.clone(),
            slug: book.slug.clone(),
            style: book.style.clone(),
            edition: i64::from(book.edition),
        }
    }
}
impl TryFrom<BookRow> for Book {
    type Error = Error;
    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: row.uuid,
            slug: row.slug,
            style: row.style,
            edition: u32::try_from(row.edition).or_raise(|| ErrorKind::InvalidData("edition"))?,
        })
    }
}
