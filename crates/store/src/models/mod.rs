mod approved;
mod commit;
mod repository;

pub use self::approved::ApprovedBook;
pub(crate) use self::approved::ApprovedBookRow;
pub use self::commit::{Book, Commit};
pub(crate) use self::commit::{BookRow, CommitRow};
pub use self::repository::Repository;
pub(crate) use self::repository::RepositoryRow;
