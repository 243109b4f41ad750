//! Install parameters and their normalization
//!
//! Raw strings from the command line, config file and host detection are
//! turned into an immutable [`InstallRequest`] exactly once, at the entry
//! point. Everything downstream takes the request by reference.

use crate::error::{SetupError, SetupResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Upstream Leo repository
pub const DEFAULT_REPO_URL: &str = "https://github.com/ProvableHQ/leo";

/// Toolchain used when none is given
pub const DEFAULT_TOOLCHAIN: &str = "stable";

/// Supported operating systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Macos,
    Windows,
}

impl Os {
    /// Canonical name used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        }
    }

    /// Name of the running OS as reported by the standard library
    pub fn host() -> &'static str {
        std::env::consts::OS
    }

    /// File name of the leo binary on this OS
    pub fn binary_name(&self) -> &'static str {
        match self {
            Self::Windows => "leo.exe",
            _ => "leo",
        }
    }
}

impl FromStr for Os {
    type Err = SetupError;

    fn from_str(s: &str) -> SetupResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" | "osx" | "mac" => Ok(Self::Macos),
            "windows" | "win32" | "win" => Ok(Self::Windows),
            other => Err(SetupError::invalid(
                "os",
                format!("unsupported operating system '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported CPU architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
}

impl Arch {
    /// Canonical name used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }

    /// Name of the running architecture as reported by the standard library
    pub fn host() -> &'static str {
        std::env::consts::ARCH
    }
}

impl FromStr for Arch {
    type Err = SetupError;

    fn from_str(s: &str) -> SetupResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" | "x86-64" => Ok(Self::X86_64),
            "arm64" | "aarch64" | "armv8" => Ok(Self::Arm64),
            other => Err(SetupError::invalid(
                "arch",
                format!("unsupported architecture '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When to persist caches after a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    Always,
    #[default]
    OnSuccess,
    Never,
}

impl SavePolicy {
    /// Whether a cache should be saved given the build outcome
    pub fn should_save(&self, build_succeeded: bool) -> bool {
        match self {
            Self::Always => true,
            Self::OnSuccess => build_succeeded,
            Self::Never => false,
        }
    }
}

impl FromStr for SavePolicy {
    type Err = SetupError;

    fn from_str(s: &str) -> SetupResult<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "always" => Ok(Self::Always),
            "on_success" => Ok(Self::OnSuccess),
            "never" => Ok(Self::Never),
            other => Err(SetupError::invalid(
                "cache-save-policy",
                format!("expected always, on_success or never, got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for SavePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Always => "always",
            Self::OnSuccess => "on_success",
            Self::Never => "never",
        };
        f.write_str(s)
    }
}

/// Characters allowed in anything that ends up inside a cache key
fn is_key_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Strip a leading "v" and check the version is usable in keys and tags
pub fn normalize_version(raw: &str) -> SetupResult<String> {
    let trimmed = raw.trim();
    let version = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if version.is_empty() {
        return Err(SetupError::invalid("version", "must not be empty"));
    }
    if let Some(bad) = version.chars().find(|c| !is_key_safe(*c)) {
        return Err(SetupError::invalid(
            "version",
            format!("character '{}' is not allowed in '{}'", bad, version),
        ));
    }
    if semver::Version::parse(version).is_err() {
        warn!("Version '{}' is not valid semver; using it as-is", version);
    }

    Ok(version.to_string())
}

/// Lower-case the toolchain name, defaulting to stable
pub fn normalize_toolchain(raw: &str) -> SetupResult<String> {
    let toolchain = raw.trim().to_ascii_lowercase();
    if toolchain.is_empty() {
        return Ok(DEFAULT_TOOLCHAIN.to_string());
    }
    if let Some(bad) = toolchain.chars().find(|c| !is_key_safe(*c)) {
        return Err(SetupError::invalid(
            "toolchain-version",
            format!("character '{}' is not allowed in '{}'", bad, toolchain),
        ));
    }
    Ok(toolchain)
}

/// Raw, unvalidated install parameters as collected from CLI and config
#[derive(Debug, Clone)]
pub struct RawParams {
    pub version: String,
    pub toolchain_version: String,
    pub os: String,
    pub arch: String,
    pub repo_url: String,
    pub cache_enabled: bool,
    pub cache_save_policy: String,
    pub run_audit: bool,
    pub audit_deny_warnings: bool,
    pub working_directory: PathBuf,
    pub install_dir: PathBuf,
}

impl RawParams {
    /// Parameters for the given version with every other value defaulted
    pub fn for_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            toolchain_version: DEFAULT_TOOLCHAIN.to_string(),
            os: Os::host().to_string(),
            arch: Arch::host().to_string(),
            repo_url: DEFAULT_REPO_URL.to_string(),
            cache_enabled: true,
            cache_save_policy: SavePolicy::default().to_string(),
            run_audit: true,
            audit_deny_warnings: false,
            working_directory: PathBuf::from("."),
            install_dir: PathBuf::from("."),
        }
    }
}

/// Validated, immutable parameters for one install run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallRequest {
    tool_version: String,
    toolchain_version: String,
    os: Os,
    arch: Arch,
    repo_url: String,
    cache_enabled: bool,
    cache_save_policy: SavePolicy,
    run_audit: bool,
    audit_deny_warnings: bool,
    working_directory: PathBuf,
    install_dir: PathBuf,
}

impl InstallRequest {
    /// Normalize raw parameters into a request.
    ///
    /// Fails with `InvalidParameter` before any external call is made.
    pub fn from_raw(raw: RawParams) -> SetupResult<Self> {
        let repo_url = raw.repo_url.trim().to_string();
        if repo_url.is_empty() {
            return Err(SetupError::invalid("repo-url", "must not be empty"));
        }

        Ok(Self {
            tool_version: normalize_version(&raw.version)?,
            toolchain_version: normalize_toolchain(&raw.toolchain_version)?,
            os: raw.os.parse()?,
            arch: raw.arch.parse()?,
            repo_url,
            cache_enabled: raw.cache_enabled,
            cache_save_policy: raw.cache_save_policy.parse()?,
            run_audit: raw.run_audit,
            audit_deny_warnings: raw.audit_deny_warnings,
            working_directory: raw.working_directory,
            install_dir: raw.install_dir,
        })
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn toolchain_version(&self) -> &str {
        &self.toolchain_version
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn cache_save_policy(&self) -> SavePolicy {
        self.cache_save_policy
    }

    pub fn run_audit(&self) -> bool {
        self.run_audit
    }

    pub fn audit_deny_warnings(&self) -> bool {
        self.audit_deny_warnings
    }

    pub fn working_directory(&self) -> &PathBuf {
        &self.working_directory
    }

    pub fn install_dir(&self) -> &PathBuf {
        &self.install_dir
    }

    /// Upstream tag for the requested version
    pub fn tag(&self) -> String {
        format!("v{}", self.tool_version)
    }

    /// Directory the source is cloned into
    pub fn source_dir(&self) -> PathBuf {
        self.working_directory.join(format!("leo-{}", self.tool_version))
    }

    /// Final location of the installed binary
    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(self.os.binary_name())
    }
}
