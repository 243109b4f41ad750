//! Configuration schema for leo-setup
//!
//! Configuration is stored at `~/.config/leo-setup/config.toml`

use crate::params::{DEFAULT_REPO_URL, DEFAULT_TOOLCHAIN};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Install defaults
    pub install: InstallConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Vulnerability audit settings
    pub audit: AuditConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable the audit event log
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Defaults for `leo-setup install`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Repository the compiler is built from
    pub repo_url: String,

    /// Rust toolchain used for the build
    pub toolchain_version: String,

    /// Directory the binary is copied into (default: `~/.cargo/bin`)
    pub install_dir: Option<PathBuf>,

    /// Directory the source is cloned into (default: current directory)
    pub working_directory: Option<PathBuf>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            repo_url: DEFAULT_REPO_URL.to_string(),
            toolchain_version: DEFAULT_TOOLCHAIN.to_string(),
            install_dir: None,
            working_directory: None,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable binary and dependency caching (default: true)
    pub enabled: bool,

    /// When to save after a run: always, on-success, never
    pub save_policy: String,

    /// Cache store root (default: `~/.cache/leo-setup`)
    pub dir: Option<PathBuf>,

    /// `cache gc` removes entries older than N days
    pub max_age_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            save_policy: "on-success".to_string(),
            dir: None,
            max_age_days: 30,
        }
    }
}

/// Vulnerability audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Run `cargo audit` before building
    pub enabled: bool,

    /// Abort the install on any finding
    pub deny_warnings: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deny_warnings: false,
        }
    }
}
