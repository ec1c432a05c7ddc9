use anyhow::{bail, Context, Result};
use notification_service::{ChannelKind, NotificationConfig};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Which notification channels the materiality threshold applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialityScope {
    /// Only the short-text channel is gated; structured alerts always go out.
    #[default]
    ShortText,
    /// Every channel is gated by the same threshold.
    AllChannels,
}

impl MaterialityScope {
    pub fn gates(&self, kind: ChannelKind) -> bool {
        match self {
            MaterialityScope::ShortText => kind == ChannelKind::ShortText,
            MaterialityScope::AllChannels => true,
        }
    }
}

impl FromStr for MaterialityScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short_text" | "short-text" => Ok(MaterialityScope::ShortText),
            "all" | "all_channels" => Ok(MaterialityScope::AllChannels),
            other => bail!("unknown materiality scope {:?}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    // Polling policy
    pub poll_interval: Duration,     // 5 minutes
    pub backoff_interval: Duration,  // 12 hours
    pub stale_penalty: Duration,     // 1 hour

    // Notification gate
    pub min_reportable_delta: f64,   // 1.0 BTC
    pub materiality_scope: MaterialityScope,

    // Reference price
    pub reference_max_age: Duration, // 24 hours

    // Outbound HTTP
    pub request_timeout: Duration,

    // Override intake
    pub intake_addr: SocketAddr,

    // Restrict polling to these tickers (all registered when unset)
    pub watch_tickers: Option<Vec<String>>,

    pub notifications: NotificationConfig,
}

impl WatcherConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), NotificationConfig::from_env())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F, notifications: NotificationConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secs = |key: &str, default: &str| -> Result<Duration> {
            let raw = var(key, default);
            let value: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds, got {:?}", key, raw))?;
            if value == 0 {
                bail!("{} must be greater than zero", key);
            }
            Ok(Duration::from_secs(value))
        };

        let min_reportable_delta: f64 = var("MIN_REPORTABLE_DELTA", "1.0")
            .trim()
            .parse()
            .context("MIN_REPORTABLE_DELTA must be a number")?;
        if !min_reportable_delta.is_finite() || min_reportable_delta < 0.0 {
            bail!("MIN_REPORTABLE_DELTA must be a non-negative number");
        }

        let watch_tickers = lookup("WATCH_TICKERS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|tickers| !tickers.is_empty());

        let config = Self {
            poll_interval: secs("POLL_INTERVAL_SECS", "300")?,
            backoff_interval: secs("BACKOFF_INTERVAL_SECS", "43200")?,
            stale_penalty: secs("STALE_PENALTY_SECS", "3600")?,
            min_reportable_delta,
            materiality_scope: var("MATERIALITY_SCOPE", "short_text").parse()?,
            reference_max_age: secs("REFERENCE_MAX_AGE_SECS", "86400")?,
            request_timeout: secs("REQUEST_TIMEOUT_SECS", "30")?,
            intake_addr: var("INTAKE_ADDR", "0.0.0.0:8080")
                .parse()
                .context("INTAKE_ADDR must be a socket address like 0.0.0.0:8080")?,
            watch_tickers,
            notifications,
        };

        Ok(config)
    }
}
