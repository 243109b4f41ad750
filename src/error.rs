//! Error types for leo-setup
//!
//! All modules use `SetupResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for leo-setup operations
pub type SetupResult<T> = Result<T, SetupError>;

/// All errors that can occur in leo-setup
#[derive(Error, Debug)]
pub enum SetupError {
    // Input errors
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    // Source errors
    #[error("Tag mismatch: requested {expected}, checkout resolved to {actual}")]
    TagMismatch { expected: String, actual: String },

    #[error("Clone of {repo} at {tag} failed: {reason}")]
    CloneError {
        repo: String,
        tag: String,
        reason: String,
    },

    #[error("Cargo.lock not found in {0}; dependencies would be unpinned")]
    LockfileMissing(PathBuf),

    // Toolchain and build errors
    #[error("Toolchain setup failed for {toolchain}: {reason}")]
    ToolchainSetup { toolchain: String, reason: String },

    #[error("Locked build failed:\n{output}")]
    BuildFailed { output: String },

    #[error("Install of {artifact} into {dir} failed: {reason}")]
    InstallFailed {
        artifact: PathBuf,
        dir: PathBuf,
        reason: String,
    },

    #[error("Vulnerability audit denied the build: {count} finding(s): {findings}")]
    AuditFailed { count: usize, findings: String },

    // Cache errors (never fatal to an install)
    #[error("Cache restore of {key} failed: {reason}")]
    CacheRestore { key: String, reason: String },

    #[error("Cache save of {key} failed: {reason}")]
    CacheSave { key: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    User(String),
}

impl SetupError {
    /// Create an invalid parameter error
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Name of the pipeline stage this error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "parameters",
            Self::TagMismatch { .. } | Self::CloneError { .. } => "clone",
            Self::LockfileMissing(_) => "lockfile",
            Self::ToolchainSetup { .. } => "toolchain",
            Self::BuildFailed { .. } => "build",
            Self::InstallFailed { .. } => "install",
            Self::AuditFailed { .. } => "audit",
            Self::CacheRestore { .. } => "cache-restore",
            Self::CacheSave { .. } => "cache-save",
            Self::ConfigInvalid { .. } | Self::ConfigDirCreate { .. } => "config",
            Self::TomlParse(_) | Self::TomlSerialize(_) => "config",
            Self::Http { .. } => "network",
            Self::Io { .. }
            | Self::CommandFailed { .. }
            | Self::CommandExecution { .. }
            | Self::Json(_)
            | Self::User(_) => "run",
        }
    }

    /// Whether this error must abort the run.
    ///
    /// Cache-layer errors degrade to "miss" or "skip save" instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CacheRestore { .. } | Self::CacheSave { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::TagMismatch { .. } => {
                Some("Check the version exists upstream: git ls-remote --tags <repo>")
            }
            Self::LockfileMissing(_) => Some("Refusing to build without a pinned dependency graph"),
            Self::ToolchainSetup { .. } => Some("Install rustup from https://rustup.rs"),
            Self::BuildFailed { .. } => {
                Some("A locked build must not be retried unlocked; fix the upstream lockfile")
            }
            Self::AuditFailed { .. } => Some("Re-run without --deny-warnings to report findings only"),
            _ => None,
        }
    }
}
