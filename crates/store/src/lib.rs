//! SQLite mirror of approved book metadata.
//!
//! This crate stores the local copy of everything the approved book list
//! reconciliation has learned from the remote source. The remote source is the
//! source of truth; this database only exists so that repeated runs do not
//! have to fetch what they already know.
//!
//! # Architecture
//! The store tracks three owned entity types and one ephemeral mirror:
//! - **Repositories**: keyed by the numeric identifier assigned by the remote
//!   source, unique by `(owner, name)`.
//! - **Commits**: keyed by content hash (globally unique), bound to exactly one
//!   repository and carrying the commit timestamp.
//! - **Books**: children of a commit, unique by uuid within that commit.
//! - **Approved books**: a flat copy of the most recently declared list,
//!   replaced wholesale on every run.
//!
//! All writes go through a [`UnitOfWork`], which wraps a single database
//! transaction. Nothing is visible to other connections until
//! [`UnitOfWork::commit`] is called.

mod db;
pub mod error;
mod models;
mod uow;

pub use crate::db::{Counts, Database};
pub use crate::models::{ApprovedBook, Book, Commit, Repository};
pub use crate::uow::{ApprovedResult, UnitOfWork};
