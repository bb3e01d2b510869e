use abl_config::Config;
use abl_github::source::{GitHubOptions, GitHubSource};
use abl_store::Database;
use abl_sync::payload::RawEntry;
use abl_sync::{Context, EntryOutcome, RateLimiter, RunReport};
use clap::{ArgAction, Parser};
use figment::providers::Serialized;
use miette::{IntoDiagnostic, miette};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code used when `--fail-on-error` is set and at least one entry failed.
const EXIT_ENTRY_FAILED: u8 = 2;

/// Reconcile the approved book list into the local SQLite mirror.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Path of the SQLite mirror.
    #[arg(long)]
    database: Option<PathBuf>,
    /// Download the approved book list from this URL.
    #[arg(long, conflicts_with = "abl_file")]
    abl_url: Option<String>,
    /// Read the approved book list from a local file instead of downloading it.
    #[arg(long)]
    abl_file: Option<PathBuf>,
    /// Run everything, including remote fetches, but discard every write.
    #[arg(long)]
    dry_run: bool,
    /// Exit with status 2 if any approved entry failed.
    #[arg(long)]
    fail_on_error: bool,
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Command-line values merged on top of every other configuration layer.
/// Unset flags must not clobber values from files or the environment.
#[derive(Debug, Default, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    abl_url: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    dry_run: bool,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Self {
            database: cli.database.clone(),
            abl_url: cli.abl_url.clone(),
            dry_run: cli.dry_run,
        }
    }
}

fn report(err: impl std::fmt::Debug) -> miette::Report {
    miette!("{err:?}")
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

fn load_config(cli: &Cli) -> miette::Result<Config> {
    let figment = Config::figment(cli.config.as_deref())
        .map_err(report)?
        .merge(Serialized::defaults(Overrides::from(cli)));
    Config::from_figment(figment).map_err(report)
}

async fn load_entries(config: &Config, file: Option<&Path>) -> miette::Result<Vec<RawEntry>> {
    let bytes = match (file, config.abl_url.as_deref()) {
        (Some(path), _) => {
            tracing::info!(path = %path.display(), "Reading approved book list");
            tokio::fs::read(path).await.into_diagnostic()?
        },
        (None, Some(url)) => {
            tracing::info!(url, "Downloading approved book list");
            let client = reqwest::Client::builder().timeout(config.github.timeout()).build().into_diagnostic()?;
            let response = client.get(url).send().await.into_diagnostic()?.error_for_status().into_diagnostic()?;
            response.bytes().await.into_diagnostic()?.to_vec()
        },
        (None, None) => {
            return Err(miette!(
                help = "pass --abl-url or --abl-file, or set ABL_RAW_URL",
                "no approved book list source configured"
            ));
        },
    };
    abl_sync::payload::parse(bytes).map_err(report)
}

fn metadata_source(config: &Config) -> miette::Result<GitHubSource> {
    let mut options = GitHubOptions {
        endpoint: config.github.api_url.clone(),
        timeout: config.github.timeout(),
        ..Default::default()
    };
    if let Some(user_agent) = &config.github.user_agent {
        options.user_agent = user_agent.clone();
    }
    GitHubSource::with_options(config.github_token().map_err(report)?, options).map_err(report)
}

fn summarize(report: &RunReport) {
    let (skipped, created, inserted, suppressed) = report.version_totals();
    tracing::info!(
        entries = report.entries.len(),
        completed = report.completed(),
        aborted = report.aborted(),
        failed = report.failed(),
        skipped,
        created,
        inserted,
        suppressed,
        mirrored = report.mirrored,
        fetches = report.fetches,
        cooldowns = report.cooldowns,
        dry_run = report.dry_run,
        "Migration finished"
    );
    for entry in &report.entries {
        if let EntryOutcome::Failed(err) = &entry.outcome {
            tracing::error!(repository = %entry.repository_name, error = ?err, "Entry failed");
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    let entries = load_entries(&config, cli.abl_file.as_deref()).await?;
    let source = metadata_source(&config)?;

    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.into_diagnostic()?;
    }
    let db = Database::connect(&config.database).await.map_err(report)?;

    let limiter = RateLimiter::new(config.limiter.interval, config.limiter.cooldown());
    let mut ctx = Context::new(&source, limiter)
        .with_default_owner(&config.default_owner)
        .with_dry_run(config.dry_run);
    let result = abl_sync::run(&db, &mut ctx, &entries).await;
    db.close().await;
    let report = result.map_err(report)?;

    summarize(&report);
    if cli.fail_on_error && report.has_failures() {
        return Ok(ExitCode::from(EXIT_ENTRY_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}
