use crate::error::{Error, ErrorKind};
use derive_more::Display;
use exn::ResultExt;

/// A source-control repository, identified by `(owner, name)` and keyed by the
/// numeric identifier the remote source assigned to it.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("{owner}/{name}")]
pub struct Repository {
    pub id: u64,
    pub owner: String,
    pub name: String,
}
impl Repository {
    pub fn new(id: u64, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            owner: owner.into(),
            name: name.into(),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RepositoryRow {
    pub(crate) id: i64,
    pub(crate) owner: String,
    pub(crate) name: String,
}
impl TryFrom<&Repository> for RepositoryRow {
    type Error = Error;
    fn try_from(repository: &Repository) -> Result<Self, Self::Error> {
        Ok(Self {
            id: i64::try_from(repository.id).or_raise(|| ErrorKind::InvalidData("repository id"))?,
            owner: repository.owner.clone(),
            name: repository.name.clone(),
        })
    }
}
impl TryFrom<RepositoryRow> for Repository {
    type Error = Error;
    fn try_from(row: RepositoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: u64::try_from(row.id).or_raise(|| ErrorKind::InvalidData("repository id"))?,
            owner: row.owner,
            name: row.name,
        })
    }
}
