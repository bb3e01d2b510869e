use crate::error::{Error, ErrorKind};
use exn::ResultExt;

/// One declared book of one declared version, exactly as the approved book
/// list stated it during the most recent run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApprovedBook {
    pub repository_owner: String,
    pub repository_name: String,
    pub edition: u32,
    pub commit_hash: String,
    pub uuid: String,
    pub slug: String,
    pub style: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ApprovedBookRow {
    pub(crate) id: i64,
    pub(crate) repository_owner: String,
    pub(crate) repository_name: String,
    pub(crate) edition: i64,
    pub(crate) commit_hash: String,
    pub(crate) uuid: String,
    pub(crate) slug: String,
    pub(crate) style: String,
}
impl From<&ApprovedBook> for ApprovedBookRow {
    fn from(book: &ApprovedBook) -> Self {
        Self {
            id: 0,
            repository_owner: book.repository_owner.clone(),
            repository_name: book.repository_name.clone(),
            edition: i64::from(book.edition),
            commit_hash: book.commit_hash.clone(),
            uuid: book.uuid.clone(),
            slug: book.slug.clone(),
            style: book.style.clone(),
        }
    }
}
impl TryFrom<ApprovedBookRow> for (i64, ApprovedBook) {
    type Error = Error;
    fn try_from(row: ApprovedBookRow) -> Result<Self, Self::Error> {
        let book = ApprovedBook {
            repository_owner: row.repository_owner,
            repository_name: row.repository_name,
            edition: u32::try_from(row.edition).or_raise(|| ErrorKind::InvalidData("edition"))?,
            commit_hash: row.commit_hash,
            uuid: row.uuid,
            slug: row.slug,
            style: row.style,
        };
        Ok((row.id, book))
    }
}
