//! Canonical book metadata, as published in source control.
//!
//! The reconciliation treats the remote source as ground truth: for a given
//! `(owner, name, commit)` it answers with the repository's numeric identity,
//! the canonical commit hash and timestamp, and the books declared in the
//! commit's `META-INF/books.xml` manifest.
//!
//! Callers interact with a [`MetadataSource`] trait object so that tests can
//! substitute the in-memory `MockSource` (behind the `mock` feature) for the
//! real [`GitHubSource`](source::GitHubSource).

pub mod error;
mod manifest;
mod models;
pub mod source;

pub use crate::manifest::parse as parse_manifest;
pub use crate::models::{CanonicalBook, CanonicalCommit};
pub use crate::source::MetadataSource;
