use crate::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::payload::{RawEntry, RepositoryName};
use crate::reconcile::{VersionOutcome, reconcile};
use abl_store::{ApprovedBook, Database};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use tracing::instrument;

/// Progress events emitted by [`migrate`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once, with the number of entries.
/// 2. [`MirrorReplaced`](Self::MirrorReplaced): exactly once, with the number
///    of approved book rows written.
/// 3. [`Entry`](Self::Entry): once per approved entry, in input order.
/// 4. [`Complete`](Self::Complete): exactly once.
///
/// The only error the stream yields is a failure to replace the approved book
/// mirror, after which it ends without [`Complete`](Self::Complete). Entry
/// failures are reported inside [`EntryReport`] instead.
#[derive(Debug)]
pub enum MigrationEvent {
    Started(u64),
    MirrorReplaced(u64),
    Entry(EntryReport),
    Complete,
}

/// How processing of one approved entry ended.
#[derive(Debug)]
pub enum EntryOutcome {
    /// Every version was reconciled.
    Completed,
    /// A version failed validation; later versions were not looked at.
    Aborted,
    /// An error stopped the entry and none of its changes were kept.
    Failed(Error),
}

#[derive(Debug)]
pub struct VersionReport {
    pub edition: u32,
    pub commit_hash: String,
    pub outcome: VersionOutcome,
}

#[derive(Debug)]
pub struct EntryReport {
    pub repository_name: String,
    pub outcome: EntryOutcome,
    /// Versions in the order they were reconciled. On failure this includes
    /// versions whose writes were discarded.
    pub versions: Vec<VersionReport>,
    /// Whether the entry's unit of work was persisted. Always `false` in a
    /// dry run.
    pub committed: bool,
}

/// Everything a completed run did, entry by entry.
#[derive(Debug, Default)]
pub struct RunReport {
    pub entries: Vec<EntryReport>,
    pub mirrored: u64,
    pub fetches: u64,
    pub cooldowns: u64,
    pub dry_run: bool,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Completed))
    }

    pub fn aborted(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Aborted))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Totals across every version of every entry: `(skipped, created,
    /// inserted, suppressed)`.
    pub fn version_totals(&self) -> (usize, usize, usize, usize) {
        let mut totals = (0, 0, 0, 0);
        for version in self.entries.iter().flat_map(|e| &e.versions) {
            match version.outcome {
                VersionOutcome::Skipped => totals.0 += 1,
                VersionOutcome::Created { inserted, suppressed } => {
                    totals.1 += 1;
                    totals.2 += inserted;
                    totals.3 += suppressed;
                },
                VersionOutcome::Extended { inserted, suppressed } => {
                    totals.2 += inserted;
                    totals.3 += suppressed;
                },
                VersionOutcome::Mismatch(_) => {},
            }
        }
        totals
    }

    fn count(&self, predicate: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.outcome)).count()
    }
}

/// Streams [`MigrationEvent`]s while reconciling every approved entry.
///
/// The approved book mirror is replaced first, in its own unit of work. Each
/// entry then runs in its own unit of work, committed once all of its versions
/// have been reconciled or one of them failed validation. An error anywhere in
/// an entry discards that entry's writes and processing moves on to the next
/// entry; there are no retries.
pub fn migrate<'a>(
    db: &'a Database,
    ctx: &'a mut Context<'_>,
    entries: &'a [RawEntry],
) -> impl Stream<Item = Result<MigrationEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(MigrationEvent::Started(u64::try_from(entries.len()).unwrap_or(0)));

        match replace_mirror(db, ctx, entries).await {
            Ok(rows) => yield Ok(MigrationEvent::MirrorReplaced(rows)),
            Err(e) => {
                yield Err(e);
                return;
            },
        }

        for entry in entries {
            yield Ok(MigrationEvent::Entry(migrate_entry(db, ctx, entry).await));
        }
        yield Ok(MigrationEvent::Complete);
    })
}

/// Run [`migrate`] to completion and collect the result.
pub async fn run(db: &Database, ctx: &mut Context<'_>, entries: &[RawEntry]) -> Result<RunReport> {
    let mut report = RunReport {
        dry_run: ctx.dry_run,
        ..Default::default()
    };
    {
        let mut events = std::pin::pin!(migrate(db, ctx, entries));
        while let Some(event) = events.next().await {
            match event? {
                MigrationEvent::Started(total) => tracing::info!(entries = total, "Starting migration"),
                MigrationEvent::MirrorReplaced(rows) => report.mirrored = rows,
                MigrationEvent::Entry(entry) => report.entries.push(entry),
                MigrationEvent::Complete => {},
            }
        }
    }
    report.fetches = ctx.source.fetches();
    report.cooldowns = ctx.source.limiter().cooldowns();
    Ok(report)
}

#[instrument("replacing approved book mirror", skip_all)]
async fn replace_mirror(db: &Database, ctx: &Context<'_>, entries: &[RawEntry]) -> Result<u64> {
    let mut uow = db.begin(ctx.dry_run).await.or_raise(|| ErrorKind::Store)?;
    let mut deleted = 0;
    for (id, _) in uow.list_approved_books().await.or_raise(|| ErrorKind::Store)? {
        if uow.delete_approved_book(id).await.or_raise(|| ErrorKind::Store)? {
            deleted += 1;
        }
    }
    let mut inserted = 0;
    for raw in entries {
        // Malformed entries are reported as entry failures when they are
        // processed; they have nothing to contribute to the mirror.
        let Ok(entry) = raw.decode() else {
            continue;
        };
        let Ok(repository) = RepositoryName::parse(&entry.repository_name, &ctx.default_owner) else {
            continue;
        };
        for version in &entry.versions {
            for book in &version.books {
                let row = ApprovedBook {
                    repository_owner: repository.owner.clone(),
                    repository_name: repository.name.clone(),
                    edition: version.edition,
                    commit_hash: version.commit_hash.clone(),
                    uuid: book.uuid.clone(),
                    slug: book.slug.clone(),
                    style: book.style.clone(),
                };
                uow.insert_approved_book(&row).await.or_raise(|| ErrorKind::Store)?;
                inserted += 1;
            }
        }
    }
    uow.commit().await.or_raise(|| ErrorKind::Store)?;
    tracing::info!(deleted, inserted, "Replaced approved book mirror");
    Ok(inserted)
}

#[instrument(skip_all, fields(repository = %entry.label()))]
async fn migrate_entry(db: &Database, ctx: &mut Context<'_>, entry: &RawEntry) -> EntryReport {
    let mut versions = Vec::new();
    let (outcome, committed) = match migrate_entry_inner(db, ctx, entry, &mut versions).await {
        Ok((outcome, committed)) => (outcome, committed),
        Err(err) => {
            tracing::error!(error = ?err, "Entry failed; its changes were discarded");
            (EntryOutcome::Failed(err), false)
        },
    };
    EntryReport {
        repository_name: entry.label().to_string(),
        outcome,
        versions,
        committed,
    }
}

async fn migrate_entry_inner(
    db: &Database,
    ctx: &mut Context<'_>,
    raw: &RawEntry,
    versions: &mut Vec<VersionReport>,
) -> Result<(EntryOutcome, bool)> {
    let entry = raw.decode()?;
    let repository = RepositoryName::parse(&entry.repository_name, &ctx.default_owner)?;
    // Dropping the unit of work on an early return rolls it back.
    let mut uow = db.begin(ctx.dry_run).await.or_raise(|| ErrorKind::Store)?;
    let mut outcome = EntryOutcome::Completed;
    for version in &entry.versions {
        let result = reconcile(&mut uow, &mut ctx.source, &repository, version).await?;
        let aborted = result.is_mismatch();
        versions.push(VersionReport {
            edition: version.edition,
            commit_hash: version.commit_hash.clone(),
            outcome: result,
        });
        if aborted {
            tracing::warn!(commit = %version.commit_hash, "Validation failed; skipping remaining versions");
            outcome = EntryOutcome::Aborted;
            break;
        }
    }
    let committed = uow.commit().await.or_raise(|| ErrorKind::Store)?;
    Ok((outcome, committed))
}
