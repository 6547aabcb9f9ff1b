// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the waitlist intake service.
//!
//! The two third-party subsystems (rate-limit counter store, confirmation
//! email provider) are optional: their config blocks exist only when the
//! corresponding environment variables are present, and their absence never
//! fails startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the waitlist intake service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Datastore address (default: mem://)
    #[serde(default = "default_database_addr")]
    pub database_addr: String,

    /// Comma-separated CORS origin allowlist; unset means permissive
    #[serde(default)]
    pub allowed_origins: Option<String>,

    /// Rate limiting configuration; unset disables the limiter (fail-open)
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    /// Confirmation email configuration; unset disables notifications
    #[serde(default)]
    pub notify: Option<NotifyConfig>,

    /// Validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Rate limiting configuration for the abuse limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Redis connection URL for the shared admission counters
    pub redis_url: String,

    /// Maximum submissions per window per source address (default: 3)
    #[serde(default = "default_max_submissions")]
    pub max_submissions: u32,

    /// Sliding window length in seconds (default: 3600)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Confirmation email configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Email provider API key
    pub api_key: String,

    /// Email provider send endpoint (default: https://api.resend.com/emails)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Sender address (default: onboarding@resend.dev)
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// Public site base URL, used for the unsubscribe link
    #[serde(default = "default_site_url")]
    pub site_url: String,
}

/// Validation limits for submission fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum name length after trimming (default: 2)
    #[serde(default = "default_min_name_chars")]
    pub min_name_chars: usize,

    /// Maximum name/company length after trimming (default: 100)
    #[serde(default = "default_max_field_chars")]
    pub max_field_chars: usize,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_addr() -> String {
    "mem://".to_string()
}

fn default_max_submissions() -> u32 {
    3
}

fn default_window_secs() -> u64 {
    3600 // 1 hour
}

fn default_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_from_email() -> String {
    "onboarding@resend.dev".to_string()
}

fn default_site_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_min_name_chars() -> usize {
    2
}

fn default_max_field_chars() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_addr: default_database_addr(),
            allowed_origins: None,
            rate_limit: None,
            notify: None,
            validation: ValidationConfig::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_name_chars: default_min_name_chars(),
            max_field_chars: default_max_field_chars(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `RATE_LIMIT_REDIS_URL` and `RESEND_API_KEY` gate their subsystems:
    /// when unset, the corresponding block is `None`.
    pub fn from_env() -> Self {
        let rate_limit =
            std::env::var("RATE_LIMIT_REDIS_URL")
                .ok()
                .map(|redis_url| RateLimitConfig {
                    redis_url,
                    max_submissions: env_parse("RATE_LIMIT_MAX", default_max_submissions()),
                    window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", default_window_secs()),
                });

        let notify = std::env::var("RESEND_API_KEY")
            .ok()
            .map(|api_key| NotifyConfig {
                api_key,
                api_url: std::env::var("RESEND_API_URL").unwrap_or_else(|_| default_api_url()),
                from_email: std::env::var("RESEND_FROM_EMAIL")
                    .unwrap_or_else(|_| default_from_email()),
                site_url: std::env::var("SITE_URL").unwrap_or_else(|_| default_site_url()),
            });

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| default_bind_addr()),
            database_addr: std::env::var("DATABASE_ADDR")
                .unwrap_or_else(|_| default_database_addr()),
            allowed_origins: std::env::var("ALLOWED_ORIGINS").ok(),
            rate_limit,
            notify,
            validation: ValidationConfig::default(),
        }
    }
}

impl RateLimitConfig {
    /// Get the sliding window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
