//! Transaction-scoped access to the mirror.
//!
//! Repositories, commits and books are tightly coupled: a commit cannot exist
//! without its repository, and books only make sense attached to a commit. So
//! instead of one repository object per table, every read and write goes
//! through a single [`UnitOfWork`] that owns one database transaction.

use crate::error::{ErrorKind, Result};
use crate::models::{ApprovedBook, ApprovedBookRow, Book, BookRow, Commit, CommitRow, Repository, RepositoryRow};
use exn::ResultExt;
use sqlx::{Sqlite, Transaction};
use time::UtcDateTime;
use tracing::instrument;

/// A stored approved book together with its row identifier.
pub type ApprovedResult = (i64, ApprovedBook);

/// A single database transaction over the mirror.
///
/// Reads see the transaction's own uncommitted writes, so a repository created
/// earlier in the unit of work is found (not re-created) by a later lookup.
/// Dropping a unit of work without calling [`commit`](Self::commit) rolls
/// every write back.
///
/// # Dry Run
///
/// A unit of work started in dry-run mode behaves identically until
/// [`commit`](Self::commit), which then rolls back instead of persisting.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    dry_run: bool,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>, dry_run: bool) -> Self {
        Self { tx, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Find a repository by its `(owner, name)` identity.
    pub async fn find_repository(&mut self, owner: &str, name: &str) -> Result<Option<Repository>> {
        let row: Option<RepositoryRow> = sqlx::query_as(include_str!("../queries/get_repository.sql"))
            .bind(owner)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Repository::try_from).transpose()
    }

    /// Find a repository by the identifier assigned by the remote source.
    pub async fn get_repository(&mut self, id: u64) -> Result<Option<Repository>> {
        let id = i64::try_from(id).or_raise(|| ErrorKind::InvalidData("repository id"))?;
        let row: Option<RepositoryRow> = sqlx::query_as(include_str!("../queries/get_repository_by_id.sql"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Repository::try_from).transpose()
    }

    /// Insert a repository unless the exact same one is already stored.
    ///
    /// Stored repositories are never modified. Returns
    /// [`ErrorKind::Constraint`] when the identifier is already bound to a
    /// different `(owner, name)`, or the `(owner, name)` to a different
    /// identifier.
    #[instrument(skip(self, repository), fields(repository = %repository))]
    pub async fn upsert_repository(&mut self, repository: &Repository) -> Result<()> {
        let row = RepositoryRow::try_from(repository)?;
        let result = sqlx::query(include_str!("../queries/upsert_repository.sql"))
            .bind(row.id)
            .bind(row.owner)
            .bind(row.name)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.get_repository(repository.id).await? {
            Some(stored) if stored == *repository => Ok(()),
            Some(_) => exn::bail!(ErrorKind::Constraint("repository id is bound to a different name")),
            None => exn::bail!(ErrorKind::Constraint("repository name is bound to a different id")),
        }
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Get a commit and all of its books (in insertion order) by content hash.
    pub async fn find_commit(&mut self, hash: &str) -> Result<Option<Commit>> {
        let row: Option<CommitRow> = sqlx::query_as(include_str!("../queries/get_commit_by_hash.sql"))
            .bind(hash)
            .fetch_optional(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let books: Vec<BookRow> = sqlx::query_as(include_str!("../queries/list_books_for_commit.sql"))
            .bind(row.id)
            .fetch_all(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.into_model(books).map(Some)
    }

    /// Record a new commit (with no books) against a repository.
    ///
    /// Returns [`ErrorKind::Constraint`] if the hash is already stored; commit
    /// hashes are unique across all repositories.
    #[instrument(skip(self, repository, timestamp), fields(repository = %repository))]
    pub async fn add_commit(&mut self, repository: &Repository, hash: &str, timestamp: UtcDateTime) -> Result<Commit> {
        let repository_id = i64::try_from(repository.id).or_raise(|| ErrorKind::InvalidData("repository id"))?;
        let inserted = sqlx::query_scalar::<_, i64>(include_str!("../queries/insert_commit.sql"))
            .bind(repository_id)
            .bind(hash)
            .bind(timestamp.unix_timestamp())
            .fetch_one(&mut *self.tx)
            .await;
        let id = match inserted {
            Ok(id) => id,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                exn::bail!(ErrorKind::Constraint("commit hash already exists"))
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Database),
        };
        Ok(Commit {
            id,
            repository_id: repository.id,
            hash: hash.to_string(),
            timestamp,
            books: Vec::new(),
        })
    }

    /// Attach a book to a commit.
    ///
    /// Returns `false` (and writes nothing) if the commit already has a book
    /// with the same uuid. On success the book is also appended to
    /// `commit.books` so the in-memory copy stays in step with the database.
    pub async fn add_book(&mut self, commit: &mut Commit, book: Book) -> Result<bool> {
        if commit.has_book(&book.uuid) {
            return Ok(false);
        }
        let row = BookRow::from(&book);
        let result = sqlx::query(include_str!("../queries/insert_book.sql"))
            .bind(commit.id)
            .bind(row.uuid)
            .bind(row.slug)
            .bind(row.style)
            .bind(row.edition)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        commit.books.push(book);
        Ok(true)
    }

    // =========================================================================
    // Approved book mirror
    // =========================================================================

    /// List every row of the approved book mirror, oldest first.
    pub async fn list_approved_books(&mut self) -> Result<Vec<ApprovedResult>> {
        let rows: Vec<ApprovedBookRow> = sqlx::query_as(include_str!("../queries/list_approved_books.sql"))
            .fetch_all(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(ApprovedResult::try_from).collect()
    }

    /// Delete one row of the approved book mirror.
    ///
    /// Returns `true` if a row was deleted, `false` if the id was not found.
    pub async fn delete_approved_book(&mut self, id: i64) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_approved_book.sql"))
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Append a row to the approved book mirror.
    pub async fn insert_approved_book(&mut self, book: &ApprovedBook) -> Result<()> {
        let row = ApprovedBookRow::from(book);
        sqlx::query(include_str!("../queries/insert_approved_book.sql"))
            .bind(row.repository_owner)
            .bind(row.repository_name)
            .bind(row.edition)
            .bind(row.commit_hash)
            .bind(row.uuid)
            .bind(row.slug)
            .bind(row.style)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Persist every write made through this unit of work.
    ///
    /// In dry-run mode the transaction is rolled back instead and `false` is
    /// returned.
    pub async fn commit(self) -> Result<bool> {
        if self.dry_run {
            self.tx.rollback().await.or_raise(|| ErrorKind::Database)?;
            tracing::debug!("Dry run; rolled back unit of work");
            return Ok(false);
        }
        self.tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(true)
    }

    /// Discard every write made through this unit of work.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.or_raise(|| ErrorKind::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn timestamp() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn approved(hash: &str, uuid: &str) -> ApprovedBook {
        ApprovedBook {
            repository_owner: "openstax".to_string(),
            repository_name: "osbooks-biology".to_string(),
            edition: 2,
            commit_hash: hash.to_string(),
            uuid: uuid.to_string(),
            slug: "biology-2e".to_string(),
            style: "biology".to_string(),
        }
    }

    #[tokio::test]
    async fn test_repository_lookup_sees_uncommitted_upsert() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut uow = db.begin(false).await.unwrap();
        assert!(uow.find_repository("openstax", "osbooks-biology").await.unwrap().is_none());
        let repository = Repository::new(185_300_544, "openstax", "osbooks-biology");
        uow.upsert_repository(&repository).await.unwrap();
        let found = uow.find_repository("openstax", "osbooks-biology").await.unwrap();
        assert_eq!(found, Some(repository));
        uow.commit().await.unwrap();
        assert_eq!(db.counts().await.unwrap().repositories, 1);
    }

    #[tokio::test]
    async fn test_upsert_repository_twice_keeps_one_row() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut uow = db.begin(false).await.unwrap();
        let repository = Repository::new(42, "openstax", "osbooks-physics");
        uow.upsert_repository(&repository).await.unwrap();
        uow.upsert_repository(&repository).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(db.counts().await.unwrap().repositories, 1);
    }

    #[tokio::test]
    async fn test_upsert_never_renames_a_stored_repository() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut uow = db.begin(false).await.unwrap();
        let original = Repository::new(42, "openstax", "osbooks-physics");
        uow.upsert_repository(&original).await.unwrap();

        let renamed = uow.upsert_repository(&Repository::new(42, "openstax", "osbooks-college-physics")).await;
        assert!(matches!(&*renamed.unwrap_err(), ErrorKind::Constraint(_)));
        let rebound = uow.upsert_repository(&Repository::new(43, "openstax", "osbooks-physics")).await;
        assert!(matches!(&*rebound.unwrap_err(), ErrorKind::Constraint(_)));

        assert_eq!(uow.get_repository(42).await.unwrap(), Some(original.clone()));
        assert_eq!(uow.find_repository("openstax", "osbooks-physics").await.unwrap(), Some(original));
        assert!(uow.get_repository(43).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_and_books_round_trip() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut uow = db.begin(false).await.unwrap();
        let repository = Repository::new(42, "openstax", "osbooks-physics");
        uow.upsert_repository(&repository).await.unwrap();
        let mut commit = uow.add_commit(&repository, "abc123", timestamp()).await.unwrap();
        assert!(uow.add_book(&mut commit, Book::new("u1", "physics", "physics", 1)).await.unwrap());
        assert!(uow.add_book(&mut commit, Book::new("u2", "college-physics", "physics", 1)).await.unwrap());
        uow.commit().await.unwrap();

        let mut uow = db.begin(false).await.unwrap();
        let stored = uow.find_commit("abc123").await.unwrap().unwrap();
        assert_eq!(stored, commit);
        assert_eq!(stored.books[0].uuid, "u1");
        assert_eq!(stored.books[1].uuid, "u2");
        assert!(uow.find_commit("def456").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_book_uuid_is_suppressed() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut uow = db.begin(false).await.unwrap();
        let repository = Repository::new(42, "openstax", "osbooks-physics");
        uow.upsert_repository(&repository).await.unwrap();
        let mut commit = uow.add_commit(&repository, "abc123", timestamp()).await.unwrap();
        assert!(uow.add_book(&mut commit, Book::new("u1", "physics", "physics", 1)).await.unwrap());
        assert!(!uow.add_book(&mut commit, Book::new("u1", "physics", "physics", 2)).await.unwrap());
        // A stale in-memory copy still hits the database constraint.
        let mut stale = uow.find_commit("abc123").await.unwrap().unwrap();
        stale.books.clear();
        assert!(!uow.add_book(&mut stale, Book::new("u1", "other", "other", 3)).await.unwrap());
        uow.commit().await.unwrap();
        assert_eq!(db.counts().await.unwrap().books, 1);
    }

    #[tokio::test]
    async fn test_duplicate_commit_hash_is_a_constraint_error() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut uow = db.begin(false).await.unwrap();
        let first = Repository::new(1, "openstax", "osbooks-physics");
        let second = Repository::new(2, "openstax", "osbooks-chemistry");
        uow.upsert_repository(&first).await.unwrap();
        uow.upsert_repository(&second).await.unwrap();
        uow.add_commit(&first, "abc123", timestamp()).await.unwrap();
        let err = uow.add_commit(&second, "abc123", timestamp()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Constraint(_)));
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let db = Database::connect_in_memory().await.unwrap();
        {
            let mut uow = db.begin(false).await.unwrap();
            uow.upsert_repository(&Repository::new(42, "openstax", "osbooks-physics")).await.unwrap();
        }
        assert_eq!(db.counts().await.unwrap().repositories, 0);
    }

    #[tokio::test]
    async fn test_dry_run_commit_rolls_back() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut uow = db.begin(true).await.unwrap();
        assert!(uow.is_dry_run());
        uow.upsert_repository(&Repository::new(42, "openstax", "osbooks-physics")).await.unwrap();
        assert!(!uow.commit().await.unwrap());
        assert_eq!(db.counts().await.unwrap().repositories, 0);
    }

    #[tokio::test]
    async fn test_approved_book_mirror() {
        let db = Database::connect_in_memory().await.unwrap();
        let mut uow = db.begin(false).await.unwrap();
        uow.insert_approved_book(&approved("abc123", "u1")).await.unwrap();
        uow.insert_approved_book(&approved("abc123", "u2")).await.unwrap();
        let rows = uow.list_approved_books().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, approved("abc123", "u1"));
        assert!(uow.delete_approved_book(rows[0].0).await.unwrap());
        assert!(!uow.delete_approved_book(rows[0].0).await.unwrap());
        uow.commit().await.unwrap();
        assert_eq!(db.counts().await.unwrap().approved_books, 1);
    }
}
