//! External collaborators
//!
//! Each tool the installer drives sits behind a trait so the orchestrator
//! and the verifier can run against in-memory fakes:
//! - `SourceControl`: git remote queries, shallow clone, tag checks
//! - `ToolchainInstaller`: rustup
//! - `BuildTool`: cargo with the lockfile enforced
//! - `VulnerabilityScanner`: cargo-audit
//! - `ReleaseAssets`: GitHub releases API

mod cargo;
mod git;
mod releases;
mod rustup;
mod scanner;

pub use cargo::CargoBuild;
pub use git::GitCli;
pub use releases::{is_attestation_asset, GithubReleases};
pub use rustup::Rustup;
pub use scanner::{parse_audit_json, CargoAudit};

use crate::error::SetupResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Result of a shallow clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneInfo {
    pub commit_sha: String,
}

/// Source-control remote and working copy operations
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Whether `tag` exists on the remote
    async fn tag_exists(&self, repo_url: &str, tag: &str) -> SetupResult<bool>;

    /// Fetch exactly `tag` at depth 1 into `dest`
    async fn shallow_clone(&self, repo_url: &str, tag: &str, dest: &Path) -> SetupResult<CloneInfo>;

    /// Every tag pointing at HEAD of the working copy
    async fn tags_at_head(&self, dir: &Path) -> SetupResult<Vec<String>>;

    /// Whether the tag carries a valid signature
    async fn verify_tag(&self, dir: &Path, tag: &str) -> SetupResult<bool>;
}

/// Installs the Rust toolchain used for the build
#[async_trait]
pub trait ToolchainInstaller: Send + Sync {
    async fn ensure(&self, toolchain: &str) -> SetupResult<()>;
}

/// Options passed to the build tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Refuse to resolve dependencies beyond the lockfile
    pub locked: bool,
    pub release: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            locked: true,
            release: true,
        }
    }
}

/// Callback receiving build output line by line
pub type OutputSink<'a> = &'a (dyn Fn(String) + Send + Sync);

/// Builds the source tree into a binary
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Build and return the path of the produced binary
    async fn build(
        &self,
        source_dir: &Path,
        options: BuildOptions,
        on_output: OutputSink<'_>,
    ) -> SetupResult<PathBuf>;

    /// Directories worth caching between builds
    fn dependency_paths(&self) -> Vec<PathBuf>;
}

/// Outcome of a vulnerability scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Pass,
    Warn,
    #[default]
    Skip,
    Fail,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Skip => "skip",
            Self::Fail => "fail",
        };
        f.write_str(s)
    }
}

/// Findings reported by the scanner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub status: AuditStatus,
    /// Advisory identifiers, vulnerabilities first
    pub findings: Vec<String>,
}

/// Static dependency vulnerability scanner
#[async_trait]
pub trait VulnerabilityScanner: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn audit(&self, source_dir: &Path, deny_warnings: bool) -> SetupResult<AuditReport>;
}

/// Published release asset listing
#[async_trait]
pub trait ReleaseAssets: Send + Sync {
    /// Names of assets attached to the release for `tag`; empty if there is no release
    async fn asset_names(&self, repo_url: &str, tag: &str) -> SetupResult<Vec<String>>;
}

/// Max number of output lines to include in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of build output for error diagnostics.
///
/// Returns the last `BUILD_ERROR_TAIL_LINES` lines so error messages are
/// actionable without being overwhelming.
pub(crate) fn build_error_output(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: OutputSink<'_>,
) -> Vec<String> {
    let mut all_output = Vec::new();
    let (Some(stderr), Some(stdout)) = (child.stderr.take(), child.stdout.take()) else {
        return all_output;
    };

    let mut stderr_reader = BufReader::new(stderr).lines();
    let mut stdout_reader = BufReader::new(stdout).lines();

    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
        }
    }

    all_output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_output_keeps_tail() {
        let lines: Vec<String> = (0..80).map(|i| format!("line {i}")).collect();
        let tail = build_error_output(&lines);
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 79"));
    }

    #[test]
    fn build_error_output_short() {
        let lines = vec!["error[E0425]".to_string()];
        assert_eq!(build_error_output(&lines), "error[E0425]");
    }

    #[test]
    fn build_options_default_is_locked_release() {
        let opts = BuildOptions::default();
        assert!(opts.locked);
        assert!(opts.release);
    }

    #[test]
    fn audit_status_display() {
        assert_eq!(AuditStatus::Pass.to_string(), "pass");
        assert_eq!(AuditStatus::default(), AuditStatus::Skip);
    }
}
