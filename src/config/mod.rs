//! Configuration management for leo-setup

pub mod schema;

pub use schema::Config;

use crate::error::{SetupError, SetupResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name of the project-local config
pub const LOCAL_CONFIG_FILE: &str = ".leo-setup.toml";

/// Keys accepted by `config set`, with their value kind
const KNOWN_KEYS: &[(&str, ValueKind)] = &[
    ("general.log_format", ValueKind::Str),
    ("general.audit_log", ValueKind::Bool),
    ("install.repo_url", ValueKind::Str),
    ("install.toolchain_version", ValueKind::Str),
    ("install.install_dir", ValueKind::Str),
    ("install.working_directory", ValueKind::Str),
    ("cache.enabled", ValueKind::Bool),
    ("cache.save_policy", ValueKind::Str),
    ("cache.dir", ValueKind::Str),
    ("cache.max_age_days", ValueKind::Int),
    ("audit.enabled", ValueKind::Bool),
    ("audit.deny_warnings", ValueKind::Bool),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Str,
    Bool,
    Int,
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leo-setup")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leo-setup")
    }

    /// Get the audit log path
    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// Names of every key `set_value` accepts
    pub fn known_keys() -> impl Iterator<Item = &'static str> {
        KNOWN_KEYS.iter().map(|(k, _)| *k)
    }

    /// Walk up from `start` looking for a project-local config
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> SetupResult<Config> {
        self.load_merged(None).await
    }

    /// Load the global config with an optional local file layered on top.
    ///
    /// Tables merge key by key; local values win.
    pub async fn load_merged(&self, local: Option<&Path>) -> SetupResult<Config> {
        let mut merged = if self.config_path.exists() {
            read_table(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            toml::Table::new()
        };

        if let Some(local) = local {
            let overlay = read_table(local).await?;
            merge_tables(&mut merged, overlay);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| SetupError::ConfigInvalid {
                path: local.unwrap_or(&self.config_path).to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> SetupResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            SetupError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Set a dotted key in the config file, keeping existing formatting
    pub async fn set_value(&self, key: &str, value: &str) -> SetupResult<()> {
        let existing = if self.config_path.exists() {
            fs::read_to_string(&self.config_path).await.map_err(|e| {
                SetupError::io(format!("reading config from {}", self.config_path.display()), e)
            })?
        } else {
            String::new()
        };

        let updated = set_in_document(&existing, key, value)
            .map_err(|reason| SetupError::User(format!("cannot set {}: {}", key, reason)))?;

        // Reject values the schema cannot load
        toml::from_str::<Config>(&updated).map_err(|e| SetupError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })?;

        self.ensure_config_dir().await?;
        fs::write(&self.config_path, updated).await.map_err(|e| {
            SetupError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;
        info!("Set {} in {}", key, self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> SetupResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SetupError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure the state directory exists
    pub async fn ensure_state_dirs() -> SetupResult<()> {
        let dir = Self::state_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SetupError::io(format!("creating directory {}", dir.display()), e))
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_table(path: &Path) -> SetupResult<toml::Table> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| SetupError::io(format!("reading config from {}", path.display()), e))?;

    content.parse().map_err(|e: toml::de::Error| SetupError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn set_in_document(source: &str, key: &str, value: &str) -> Result<String, String> {
    let kind = KNOWN_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| "unknown key".to_string())?;

    let (section, field) = key
        .split_once('.')
        .ok_or_else(|| "expected section.key".to_string())?;

    let mut doc: toml_edit::DocumentMut = source.parse().map_err(|e| format!("{}", e))?;

    let item = match kind {
        ValueKind::Str => toml_edit::value(value),
        ValueKind::Bool => toml_edit::value(parse_bool(value)?),
        ValueKind::Int => toml_edit::value(
            value
                .parse::<i64>()
                .map_err(|_| format!("'{}' is not a number", value))?,
        ),
    };

    if !doc.contains_table(section) {
        doc[section] = toml_edit::table();
    }
    doc[section][field] = item;
    Ok(doc.to_string())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(format!("invalid boolean value '{}', use true/false", value)),
    }
}
