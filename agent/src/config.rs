//! Configuration management for the agent.

use std::env;
use std::time::Duration;

use sitesync_engine::RetryPolicy;

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Control API host address
    pub host: String,
    /// Control API port
    pub port: u16,
    /// SQLite connection URL for the local store
    pub database_url: String,
    /// Base URL of the remote REST backend
    pub remote_base_url: String,
    /// Bearer token sent to the remote backend
    pub remote_api_token: Option<String>,
    /// URL probed for internet reachability
    pub probe_url: String,
    /// Auto-sync period; `None` disables background sync
    pub sync_interval: Option<Duration>,
    /// Bound on a single remote call
    pub operation_timeout: Duration,
    /// Retry gate for queued operations
    pub retry_policy: RetryPolicy,
    /// Bearer secret required by the control API, if set
    pub auth_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "4010".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://sitesync.db?mode=rwc".to_string());

        let remote_base_url = lookup("REMOTE_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingRemoteBaseUrl)?;

        let remote_api_token = lookup("REMOTE_API_TOKEN").filter(|t| !t.is_empty());
        let probe_url = lookup("PROBE_URL").unwrap_or_else(|| remote_base_url.clone());

        let interval_secs = parse_number(&lookup, "SYNC_INTERVAL_SECS", 60)?;
        let sync_interval = (interval_secs > 0).then(|| Duration::from_secs(interval_secs));

        let operation_timeout =
            Duration::from_secs(parse_number(&lookup, "OPERATION_TIMEOUT_SECS", 30)?);
        if operation_timeout.is_zero() {
            return Err(ConfigError::InvalidNumber("OPERATION_TIMEOUT_SECS"));
        }

        let max_retries = parse_number(
            &lookup,
            "MAX_RETRIES",
            RetryPolicy::DEFAULT_MAX_RETRIES.into(),
        )?;
        let max_retries =
            u32::try_from(max_retries).map_err(|_| ConfigError::InvalidNumber("MAX_RETRIES"))?;
        let cooldown_secs = parse_number(&lookup, "RETRY_COOLDOWN_SECS", 300)?;

        let auth_secret = lookup("AUTH_SECRET").filter(|s| !s.is_empty());

        Ok(Self {
            host,
            port,
            database_url,
            remote_base_url,
            remote_api_token,
            probe_url,
            sync_interval,
            operation_timeout,
            retry_policy: RetryPolicy::new(max_retries, cooldown_secs.saturating_mul(1000)),
            auth_secret,
        })
    }
}

fn parse_number<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(name)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("REMOTE_BASE_URL environment variable is required")]
    MissingRemoteBaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {0} value")]
    InvalidNumber(&'static str),
}
