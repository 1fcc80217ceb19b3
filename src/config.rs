//! Application configuration loaded from environment variables.
//!
//! Non-sensitive settings and secrets are both read from the environment;
//! in production the deployment platform injects secrets as env vars.

use std::env;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Bearer secret required on /cron/* routes
    pub cron_secret: String,
    /// Webhook verification token
    pub webhook_verify_token: String,

    /// Tunables for the sync orchestrators and fetcher.
    pub sync: SyncConfig,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            strava_client_secret: "test_secret".to_string(),
            cron_secret: "test_cron_secret".to_string(),
            webhook_verify_token: "test_verify_token".to_string(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            cron_secret: env::var("CRON_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CRON_SECRET"))?,
            webhook_verify_token: env::var("WEBHOOK_VERIFY_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("WEBHOOK_VERIFY_TOKEN"))?,
            sync: SyncConfig::default(),
        })
    }
}

/// Tunables for a sync run.
///
/// Passed explicitly into the orchestrators and the fetcher rather than read
/// from module-level globals, so cron callers can override per request.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of users processed simultaneously.
    pub concurrency_limit: usize,
    /// Page size for provider listing requests.
    pub batch_size: u32,
    /// Attempts per user before marking the user failed.
    pub retry_attempts: u32,
    /// Base delay for exponential retry backoff, in milliseconds.
    pub retry_delay_ms: u64,
    /// Stream requests issued per rate-limit batch.
    pub stream_batch_size: usize,
    /// Pause between consecutive stream batches, in milliseconds.
    pub stream_batch_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            batch_size: 100,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            // Strava allows roughly 100 requests / 15 min: 10 requests
            // per burst with a 3s pause keeps a single user well under it.
            stream_batch_size: 10,
            stream_batch_delay_ms: 3000,
        }
    }
}

impl SyncConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn stream_batch_delay(&self) -> Duration {
        Duration::from_millis(self.stream_batch_delay_ms)
    }

    /// Reject values that would stall or overload a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Invalid("concurrency_limit must be > 0"));
        }
        if self.batch_size == 0 || self.batch_size > 200 {
            return Err(ConfigError::Invalid("batch_size must be in 1..=200"));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid("retry_attempts must be > 0"));
        }
        if self.stream_batch_size == 0 {
            return Err(ConfigError::Invalid("stream_batch_size must be > 0"));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", "test_secret");
        env::set_var("CRON_SECRET", "test_cron");
        env::set_var("WEBHOOK_VERIFY_TOKEN", "test_verify");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.strava_client_secret, "test_secret");
        assert_eq!(config.port, 8080);
        assert_eq!(config.sync.concurrency_limit, 5);
    }

    #[test]
    fn test_sync_config_defaults_are_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sync_config_rejects_zero_concurrency() {
        let config = SyncConfig {
            concurrency_limit: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sync_config_rejects_oversized_page() {
        let config = SyncConfig {
            batch_size: 500,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
