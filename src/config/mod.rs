//! Configuration management for the table-setup service
//!
//! This module handles configuration loading from environment variables
//! and TOML files, validation, and default values.

pub mod app;
pub mod setup;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use setup::SetupConfig;
