use std::time::Duration;

use anyhow::{bail, Context};

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Period of the matching pass (default: 5 minutes).
    pub matching_interval: Duration,
    /// Period of the campaign manager forwarding (default: daily).
    pub forwarding_interval: Duration,
    /// Run the forwarding job at all (default: `true`).
    pub forwarding_enabled: bool,
    /// Build and log digests without sending or updating anything
    /// (default: `false`).
    pub forwarding_dry_run: bool,
    /// Invite new proxies for requests the matching pass left over
    /// (default: `true`).
    pub outreach_enabled: bool,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                    | Default    |
    /// |----------------------------|------------|
    /// | `DATABASE_URL`             | (required) |
    /// | `MATCHING_INTERVAL_SECS`   | `300`      |
    /// | `FORWARDING_INTERVAL_SECS` | `86400`    |
    /// | `FORWARDING_ENABLED`       | `true`     |
    /// | `FORWARDING_DRY_RUN`       | `false`    |
    /// | `OUTREACH_ENABLED`         | `true`     |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        Ok(Self {
            database_url,
            matching_interval: secs(&lookup, "MATCHING_INTERVAL_SECS", 300)?,
            forwarding_interval: secs(&lookup, "FORWARDING_INTERVAL_SECS", 86_400)?,
            forwarding_enabled: flag(&lookup, "FORWARDING_ENABLED", true)?,
            forwarding_dry_run: flag(&lookup, "FORWARDING_DRY_RUN", false)?,
            outreach_enabled: flag(&lookup, "OUTREACH_ENABLED", true)?,
        })
    }
}

fn secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> anyhow::Result<Duration> {
    let value = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a number of seconds"))?,
        None => default,
    };
    if value == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(value))
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> anyhow::Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got {other:?}"),
    }
}
