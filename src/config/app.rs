//! Main application configuration
//!
//! This module defines the top-level configuration for the setup service,
//! loaded from environment variables or a TOML file and validated before use.

use crate::config::setup::SetupConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub setup: SetupConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "table-setup".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Parse an environment variable into `target` if it is set
fn env_override<T: std::str::FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(value) = env::var(name) {
        *target = value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", name, value))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still override it
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(prefix) = env::var("SETUP_PREFIX") {
            self.setup.command_prefix = prefix;
        }
        env_override(
            "SETUP_TIMEOUT_SECONDS",
            &mut self.setup.inactivity_timeout_seconds,
        )?;
        env_override(
            "SETUP_TIMEOUT_WARN_SECONDS",
            &mut self.setup.inactivity_warning_seconds,
        )?;
        env_override(
            "INVITE_TIMEOUT_SECONDS",
            &mut self.setup.invite_timeout_seconds,
        )?;
        env_override(
            "CONFIRM_TIMEOUT_SECONDS",
            &mut self.setup.confirmation_timeout_seconds,
        )?;
        Ok(())
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    let setup = &config.setup;
    if setup.command_prefix.trim().is_empty() {
        return Err(anyhow!("Command prefix cannot be empty"));
    }
    if setup.inactivity_timeout_seconds == 0 {
        return Err(anyhow!("Setup inactivity timeout must be greater than 0"));
    }
    if setup.inactivity_warning_seconds >= setup.inactivity_timeout_seconds {
        return Err(anyhow!(
            "Setup timeout warning ({}s) must be shorter than the timeout ({}s)",
            setup.inactivity_warning_seconds,
            setup.inactivity_timeout_seconds
        ));
    }
    if setup.invite_timeout_seconds == 0 {
        return Err(anyhow!("Invite timeout must be greater than 0"));
    }
    if setup.confirmation_timeout_seconds == 0 {
        return Err(anyhow!("Confirmation timeout must be greater than 0"));
    }
    if setup.command_buffer == 0 {
        return Err(anyhow!("Command buffer must be greater than 0"));
    }

    Ok(())
}
