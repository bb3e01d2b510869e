use crate::error::{ErrorKind, Result};
use abl_store::{Repository, UnitOfWork};
use exn::ResultExt;

/// Find the repository called `owner/name`, creating it with the identifier
/// assigned by the remote source when it does not exist yet.
///
/// An existing repository is returned untouched even when `remote_id`
/// disagrees with its stored identifier. Stored repositories are never
/// renamed: if `remote_id` already belongs to a repository with a different
/// `owner/name`, this fails with [`ErrorKind::Store`] (caused by a store
/// constraint violation).
pub async fn resolve(uow: &mut UnitOfWork, owner: &str, name: &str, remote_id: u64) -> Result<Repository> {
    if let Some(repository) = uow.find_repository(owner, name).await.or_raise(|| ErrorKind::Store)? {
        return Ok(repository);
    }
    let repository = Repository::new(remote_id, owner, name);
    uow.upsert_repository(&repository).await.or_raise(|| ErrorKind::Store)?;
    tracing::info!(repository = %repository, id = remote_id, "Registered new repository");
    Ok(repository)
}
