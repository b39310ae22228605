//! Configuration for the tenant registry.
//!
//! Supports programmatic construction as well as environment variable and
//! command line overrides.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TENANCY_LOG_LEVEL` | info | Log level |
//! | `TENANCY_SHUTDOWN_TIMEOUT_MS` | 30000 | Timeout per shutdown hook (milliseconds) |
//! | `TENANCY_ALLOW_OVERWRITE` | true | Allow re-registering an existing tenant |
//! | `TENANCY_MAX_TENANTS` | (unlimited) | Maximum number of registered tenants |
//! | `TENANCY_IDLE_TIMEOUT_SECS` | 300 | Idle time before a tenant is evictable |
//!
//! # Example
//!
//! ```rust
//! use helios_tenancy::TenancyConfig;
//!
//! let config = TenancyConfig {
//!     max_tenants: Some(64),
//!     allow_overwrite: false,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};

/// Tenant registry configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "tenancy")]
#[command(about = "Tenant data source registry")]
pub struct TenancyConfig {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TENANCY_LOG_LEVEL", default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Timeout applied to each shutdown hook, in milliseconds.
    #[arg(long, env = "TENANCY_SHUTDOWN_TIMEOUT_MS", default_value = "30000")]
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Allow re-registering a tenant that already has a data source.
    ///
    /// The displaced data source is handed back to the caller, not closed.
    #[arg(long, env = "TENANCY_ALLOW_OVERWRITE", default_value = "true", action = ArgAction::Set)]
    #[serde(default = "default_true")]
    pub allow_overwrite: bool,

    /// Maximum number of registered tenants.
    #[arg(long, env = "TENANCY_MAX_TENANTS")]
    #[serde(default)]
    pub max_tenants: Option<usize>,

    /// Seconds without a lookup before a tenant counts as idle.
    #[arg(long, env = "TENANCY_IDLE_TIMEOUT_SECS", default_value = "300")]
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_idle_timeout_secs() -> u64 {
    300 // 5 minutes
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            allow_overwrite: true,
            max_tenants: None,
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl TenancyConfig {
    /// Creates a configuration from environment variables, falling back to
    /// defaults when parsing fails.
    pub fn from_env() -> Self {
        Self::try_parse_from(["tenancy"]).unwrap_or_default()
    }

    /// Returns the per-hook shutdown timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Returns the idle threshold used for eviction.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.shutdown_timeout_ms == 0 {
            errors.push("Shutdown timeout cannot be 0".to_string());
        }

        if self.max_tenants == Some(0) {
            errors.push("Max tenants cannot be 0".to_string());
        }

        if self.idle_timeout_secs == 0 {
            errors.push("Idle timeout cannot be 0".to_string());
        }

        if !matches!(
            self.log_level.to_ascii_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            errors.push(format!("Unknown log level: {}", self.log_level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// Uses short timeouts so hanging hooks fail fast.
    pub fn for_testing() -> Self {
        Self {
            log_level: "debug".to_string(),
            shutdown_timeout_ms: 200,
            allow_overwrite: true,
            max_tenants: None,
            idle_timeout_secs: 1,
        }
    }
}
