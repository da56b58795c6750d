use std::time::Duration;

use anyhow::{Context, Result};

use crate::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub sync_max_retries: u32,
    pub sync_backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
            sync_max_retries: optional_env("SYNC_MAX_RETRIES", "5")
                .parse::<u32>()
                .context("SYNC_MAX_RETRIES must be a non-negative integer")?,
            sync_backoff_ms: optional_env("SYNC_BACKOFF_MS", "500")
                .parse::<u64>()
                .context("SYNC_BACKOFF_MS must be a duration in milliseconds")?,
        })
    }

    pub fn sync_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.sync_max_retries,
            Duration::from_millis(self.sync_backoff_ms),
        )
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
