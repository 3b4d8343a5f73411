use std::env;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Connection settings for one external system (CRM or ERP).
#[derive(Debug, Clone)]
pub struct ExternalSystemConfig {
    /// Base URL of the source's REST API
    pub base_url: String,

    /// Bearer token sent with every request
    pub api_token: Option<String>,
}

/// Settings for the hosted recommendation scorer.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub api_url: String,
    pub api_token: Option<String>,
}

/// Process configuration, read once from the environment and passed by value
/// into each component constructor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; the in-memory store is used when unset
    pub database_url: Option<String>,

    pub database_max_connections: u32,

    pub server_host: String,

    pub server_port: u16,

    /// Existing records are only rewritten by a non-forced sync once older than this
    pub sync_stale_after: chrono::Duration,

    /// Upper bound applied to every external-system call
    pub external_timeout: Duration,

    pub crm: Option<ExternalSystemConfig>,

    pub erp: Option<ExternalSystemConfig>,

    pub scoring: Option<ScoringConfig>,

    pub worker_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            sync_stale_after: chrono::Duration::hours(24),
            external_timeout: Duration::from_secs(30),
            crm: None,
            erp: None,
            scoring: None,
            worker_poll_interval: Duration::from_secs(3600),
        }
    }
}

impl Config {
    /// Builds the configuration from process environment variables.
    ///
    /// Call `dotenv().ok()` beforehand to pick up a local `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let sync_stale_hours: i64 = parse_var("SYNC_STALE_AFTER_HOURS", 24)?;
        let timeout_secs: u64 = parse_var("EXTERNAL_TIMEOUT_SECONDS", 30)?;
        let poll_secs: u64 = parse_var("WORKER_POLL_INTERVAL_SECONDS", 3600)?;

        Ok(Self {
            database_url: optional_var("DATABASE_URL"),
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            server_host: optional_var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_var("SERVER_PORT", defaults.server_port)?,
            sync_stale_after: chrono::Duration::hours(sync_stale_hours),
            external_timeout: Duration::from_secs(timeout_secs),
            crm: optional_var("CRM_BASE_URL").map(|base_url| ExternalSystemConfig {
                base_url,
                api_token: optional_var("CRM_API_TOKEN"),
            }),
            erp: optional_var("ERP_BASE_URL").map(|base_url| ExternalSystemConfig {
                base_url,
                api_token: optional_var("ERP_API_TOKEN"),
            }),
            scoring: optional_var("SCORING_API_URL").map(|api_url| ScoringConfig {
                api_url,
                api_token: optional_var("SCORING_API_TOKEN"),
            }),
            worker_poll_interval: Duration::from_secs(poll_secs),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("Invalid {}: {}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sync_stale_after, chrono::Duration::hours(24));
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(config.crm.is_none());
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("COLLECTPILOT_TEST_PORT", "not-a-port");
        let parsed: Result<u16> = parse_var("COLLECTPILOT_TEST_PORT", 3000);
        assert!(matches!(parsed, Err(AppError::Configuration { .. })));
        env::remove_var("COLLECTPILOT_TEST_PORT");
    }

    #[test]
    fn test_parse_var_falls_back_when_unset() {
        let parsed: u64 = parse_var("COLLECTPILOT_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(parsed, 42);
    }
}
