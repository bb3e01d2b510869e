//! Throttling for the remote metadata source.

use abl_github::error::Result as SourceResult;
use abl_github::{CanonicalCommit, MetadataSource};
use std::time::Duration;

/// A call-counting gate in front of the metadata source.
///
/// Every call to [`wait`](Self::wait) either counts towards the interval or,
/// once `interval` calls have been counted, sleeps for the fixed cooldown and
/// starts counting again from zero. Elapsed wall-clock time between calls is
/// irrelevant: a slow caller pays the same cooldown as a fast one.
///
/// One limiter must be shared by every fetch in a run; it bounds the
/// aggregate call volume, not the rate of any single caller.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    count: u32,
    interval: u32,
    cooldown: Duration,
    cooldowns: u64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_COOLDOWN)
    }
}

impl RateLimiter {
    pub const DEFAULT_INTERVAL: u32 = 5;
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2500);

    pub fn new(interval: u32, cooldown: Duration) -> Self {
        Self {
            count: 0,
            interval,
            cooldown,
            cooldowns: 0,
        }
    }

    /// Suspend the caller if the interval has been used up.
    pub async fn wait(&mut self) {
        if self.count >= self.interval {
            tracing::debug!(cooldown_ms = self.cooldown.as_millis() as u64, "Rate limit interval reached; cooling down");
            tokio::time::sleep(self.cooldown).await;
            self.count = 0;
            self.cooldowns += 1;
        } else {
            self.count += 1;
        }
    }

    /// Calls counted since the last cooldown.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Number of cooldowns performed so far.
    pub fn cooldowns(&self) -> u64 {
        self.cooldowns
    }
}

/// A [`MetadataSource`] that can only be reached through a [`RateLimiter`].
pub struct ThrottledSource<'a> {
    source: &'a dyn MetadataSource,
    limiter: RateLimiter,
    fetches: u64,
}

impl<'a> ThrottledSource<'a> {
    pub fn new(source: &'a dyn MetadataSource, limiter: RateLimiter) -> Self {
        Self {
            source,
            limiter,
            fetches: 0,
        }
    }

    /// Wait for the limiter, then fetch.
    pub async fn fetch(&mut self, name: &str, owner: &str, commit: &str) -> SourceResult<CanonicalCommit> {
        self.limiter.wait().await;
        self.fetches += 1;
        tracing::debug!(source = self.source.name(), owner, name, commit, "Fetching canonical commit");
        self.source.fetch(name, owner, commit).await
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Number of fetches attempted (successful or not).
    pub fn fetches(&self) -> u64 {
        self.fetches
    }
}
