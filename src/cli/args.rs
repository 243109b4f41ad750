//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// leo-setup - build and cache the Leo compiler in CI
///
/// Installs a pinned Leo release from source, reusing a cached binary or
/// cached build dependencies whenever possible.
#[derive(Parser, Debug)]
#[command(name = "leo-setup")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LEO_SETUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .leo-setup.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install leo, from cache when possible
    Install(InstallArgs),

    /// Check a release's provenance before pinning it
    Verify(VerifyArgs),

    /// Print the cache keys for a set of parameters
    Keys(KeysArgs),

    /// Manage the local cache store
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Parameters that determine the cache keys
#[derive(Args, Debug, Clone)]
pub struct ParamArgs {
    /// Leo version to install (e.g. 3.4.0 or v3.4.0)
    #[arg(id = "leo_version", value_name = "VERSION", env = "LEO_VERSION")]
    pub version: String,

    /// Rust toolchain used for the build (default: from config, then stable)
    #[arg(long, env = "LEO_SETUP_TOOLCHAIN")]
    pub toolchain: Option<String>,

    /// Target operating system (default: host)
    #[arg(long)]
    pub os: Option<String>,

    /// Target architecture (default: host)
    #[arg(long)]
    pub arch: Option<String>,
}

/// Arguments for the install command
#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    /// Repository to build from
    #[arg(long)]
    pub repo_url: Option<String>,

    /// Disable binary and dependency caching
    #[arg(long)]
    pub no_cache: bool,

    /// When to save caches: always, on-success, never
    #[arg(long)]
    pub save_policy: Option<String>,

    /// Skip the vulnerability audit
    #[arg(long)]
    pub no_audit: bool,

    /// Fail the install on any audit finding
    #[arg(long, conflicts_with = "no_audit")]
    pub deny_warnings: bool,

    /// Directory the source is cloned into
    #[arg(long)]
    pub working_directory: Option<PathBuf>,

    /// Directory the binary is installed into
    #[arg(long)]
    pub install_dir: Option<PathBuf>,

    /// Cache store root
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Cargo home used by the build (default: ~/.cargo)
    #[arg(long, env = "CARGO_HOME")]
    pub cargo_home: Option<PathBuf>,

    /// File that step outputs are appended to
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub output_file: Option<PathBuf>,
}

/// Arguments for the verify command
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Leo version to verify
    #[arg(id = "leo_version", value_name = "VERSION", env = "LEO_VERSION")]
    pub version: String,

    /// Repository to verify against
    #[arg(long)]
    pub repo_url: Option<String>,

    /// Skip the vulnerability audit
    #[arg(long)]
    pub no_audit: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Keep the cloned source instead of deleting it
    #[arg(long)]
    pub keep: bool,

    /// Token for the GitHub API (raises rate limits)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

/// Arguments for the keys command
#[derive(Args, Debug)]
pub struct KeysArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.save_policy)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Cache store root (default: from config)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cache entries, newest first
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove entries older than the configured age
    Gc {
        /// Remove entries older than N days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every cache entry
    Clear,
}
