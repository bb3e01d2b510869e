//! Configuration loading and validation.
//!
//! Configuration is layered with [figment], each layer overriding the last:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A configuration file: the path given explicitly, or `config.toml` in the
//!    platform config directory (e.g. `~/.config/abl/config.toml`) if it
//!    exists. TOML, YAML and JSON are supported, chosen by file extension.
//! 3. `GITHUB_TOKEN` and `ABL_RAW_URL`, the variable names used by earlier
//!    tooling.
//! 4. Environment variables prefixed with `ABL_`, using `__` to separate
//!    nested keys (e.g. `ABL_LIMITER__INTERVAL=10`).
//!
//! Command-line overrides are merged on top by the binary via
//! [`Config::figment`].

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_OWNER: &str = "openstax";
pub const DEFAULT_INTERVAL: u32 = 5;
pub const DEFAULT_COOLDOWN_MS: u64 = 2500;
const DEFAULT_DATABASE: &str = "abl.sqlite3";
const ENV_PREFIX: &str = "ABL_";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "openstax", "abl")
}

/// Fully merged application configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Path of the SQLite mirror.
    pub database: PathBuf,
    /// Where to download the approved book list from.
    pub abl_url: Option<String>,
    /// Owner assumed for repository names without an `owner/` segment.
    pub default_owner: String,
    /// Run the full reconciliation but roll back every write.
    pub dry_run: bool,
    pub github: GitHubConfig,
    pub limiter: LimiterConfig,
}
impl Default for Config {
    fn default() -> Self {
        let database = project_dirs()
            .map(|dirs| dirs.data_dir().join(DEFAULT_DATABASE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
        Self {
            database,
            abl_url: None,
            default_owner: DEFAULT_OWNER.to_string(),
            dry_run: false,
            github: GitHubConfig::default(),
            limiter: LimiterConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com/graphql".to_string(),
            timeout_secs: 30,
            user_agent: None,
        }
    }
}
impl GitHubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Rate limiter settings: after `interval` fetches, pause for `cooldown_ms`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimiterConfig {
    pub interval: u32,
    pub cooldown_ms: u64,
}
impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}
impl LimiterConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Config {
    /// Path of the default configuration file, if the platform has a config
    /// directory.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Build the layered [`Figment`] without extracting it, so that callers
    /// can merge further providers (command-line flags) on top.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => figment = Self::merge_file(figment, path)?,
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.exists()) {
                    tracing::debug!(path = %path.display(), "Using default config file");
                    figment = Self::merge_file(figment, &path)?;
                }
            },
        }
        let legacy = Env::raw().only(&["GITHUB_TOKEN", "ABL_RAW_URL"]).map(|key| {
            if key.as_str().eq_ignore_ascii_case("GITHUB_TOKEN") {
                "github.token".into()
            } else {
                "abl_url".into()
            }
        });
        Ok(figment.merge(legacy).merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    /// Load and validate configuration from every layer.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path)?)
    }

    /// Extract and validate configuration from a prepared [`Figment`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.limiter.interval == 0 {
            exn::bail!(ErrorKind::Invalid {
                key: "limiter.interval",
                reason: "must be at least 1",
            });
        }
        if self.default_owner.trim().is_empty() || self.default_owner.contains('/') {
            exn::bail!(ErrorKind::Invalid {
                key: "default_owner",
                reason: "must be a single non-empty path segment",
            });
        }
        if self.github.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid {
                key: "github.token",
                reason: "must not be empty",
            });
        }
        Ok(())
    }

    /// The GitHub token, required before talking to the GitHub API.
    pub fn github_token(&self) -> Result<&str> {
        match self.github.token.as_deref() {
            Some(token) => Ok(token),
            None => exn::bail!(ErrorKind::Invalid {
                key: "github.token",
                reason: "is required (set GITHUB_TOKEN or ABL_GITHUB__TOKEN)",
            }),
        }
    }
}
