//! Reconciliation of the approved book list (ABL) against the local mirror.
//!
//! The approved book list declares, for each content repository, which
//! commits have been approved and which books each commit should contain.
//! [`migrate::run`] walks that list and, for every declared version:
//!
//! - skips it when the mirror already holds the commit with the declared
//!   number of books,
//! - otherwise fetches the canonical commit through a [`RateLimiter`],
//!   checks the declared books against it and records whatever is missing.
//!
//! Each approved entry is reconciled in its own [`UnitOfWork`](abl_store::UnitOfWork),
//! so one broken entry never costs the others their progress.

pub mod error;
mod limiter;
pub mod migrate;
pub mod payload;
mod reconcile;
mod resolve;
#[cfg(test)]
mod testing;
pub mod validate;

pub use crate::limiter::{RateLimiter, ThrottledSource};
pub use crate::migrate::{EntryOutcome, EntryReport, MigrationEvent, RunReport, VersionReport, migrate, run};
pub use crate::payload::{ApprovedEntry, DeclaredBook, DeclaredVersion, RawEntry, RepositoryName};
pub use crate::reconcile::{VersionOutcome, reconcile};
pub use crate::resolve::resolve;

use abl_github::MetadataSource;

/// The repository owner assumed for approved entries without one.
pub const DEFAULT_OWNER: &str = "openstax";

/// Per-run state shared by every entry: the gated metadata source and the
/// run-wide options.
pub struct Context<'a> {
    source: ThrottledSource<'a>,
    default_owner: String,
    dry_run: bool,
}

impl<'a> Context<'a> {
    pub fn new(source: &'a dyn MetadataSource, limiter: RateLimiter) -> Self {
        Self {
            source: ThrottledSource::new(source, limiter),
            default_owner: DEFAULT_OWNER.to_string(),
            dry_run: false,
        }
    }

    pub fn with_default_owner(mut self, owner: impl Into<String>) -> Self {
        self.default_owner = owner.into();
        self
    }

    /// Roll back every unit of work instead of committing it.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn source(&self) -> &ThrottledSource<'a> {
        &self.source
    }
}
