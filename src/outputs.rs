//! Step outputs for the calling CI workflow
//!
//! Outputs are `name=value` lines appended to the file named by
//! `GITHUB_OUTPUT` (or `--output-file`). Without a file they go to stdout.

use crate::cache::orchestrator::CacheOutcome;
use crate::error::{SetupError, SetupResult};
use crate::params::InstallRequest;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Values published after an install run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutputs {
    /// Unset when the run ended without a leo binary in place
    pub tool_version_installed: Option<String>,
    pub binary_cache_hit: bool,
    pub dependency_cache_hit: bool,
    pub build_duration_seconds: u64,
    pub binary_path: PathBuf,
}

impl RunOutputs {
    pub fn new(request: &InstallRequest, outcome: &CacheOutcome) -> Self {
        let installed = outcome.binary_hit || outcome.build_performed;
        Self {
            tool_version_installed: installed.then(|| request.tool_version().to_string()),
            binary_cache_hit: outcome.binary_hit,
            dependency_cache_hit: outcome.dependency_hit,
            build_duration_seconds: outcome.build_duration_seconds,
            binary_path: request.binary_path(),
        }
    }

    /// Render as `name=value` lines
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "tool-version-installed={}",
            self.tool_version_installed.as_deref().unwrap_or_default()
        );
        let _ = writeln!(out, "binary-cache-hit={}", self.binary_cache_hit);
        let _ = writeln!(out, "dependency-cache-hit={}", self.dependency_cache_hit);
        let _ = writeln!(out, "build-duration-seconds={}", self.build_duration_seconds);
        let _ = writeln!(out, "binary-path={}", self.binary_path.display());
        out
    }

    /// Append to `path`, or print when no output file is configured
    pub async fn publish(&self, path: Option<&Path>) -> SetupResult<()> {
        let rendered = self.render();
        let Some(path) = path else {
            print!("{}", rendered);
            return Ok(());
        };

        debug!("Writing step outputs to {}", path.display());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| SetupError::io(format!("opening output file {}", path.display()), e))?;
        file.write_all(rendered.as_bytes())
            .await
            .map_err(|e| SetupError::io(format!("writing output file {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| SetupError::io(format!("writing output file {}", path.display()), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RawParams;
    use tempfile::TempDir;

    fn request() -> InstallRequest {
        let mut raw = RawParams::for_version("v3.4.0");
        raw.os = "linux".to_string();
        raw.arch = "x86_64".to_string();
        raw.install_dir = PathBuf::from("/opt/leo/bin");
        InstallRequest::from_raw(raw).unwrap()
    }

    fn outputs(binary_hit: bool) -> RunOutputs {
        let outcome = CacheOutcome {
            binary_hit,
            build_performed: !binary_hit,
            build_duration_seconds: if binary_hit { 0 } else { 412 },
            ..CacheOutcome::default()
        };
        RunOutputs::new(&request(), &outcome)
    }

    #[test]
    fn renders_kebab_case_lines() {
        let rendered = outputs(false).render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "tool-version-installed=3.4.0",
                "binary-cache-hit=false",
                "dependency-cache-hit=false",
                "build-duration-seconds=412",
                "binary-path=/opt/leo/bin/leo",
            ]
        );
    }

    #[test]
    fn failed_run_reports_no_installed_version() {
        let outcome = CacheOutcome {
            dependency_hit: true,
            ..CacheOutcome::default()
        };
        let outputs = RunOutputs::new(&request(), &outcome);

        assert_eq!(outputs.tool_version_installed, None);
        let rendered = outputs.render();
        assert!(rendered.starts_with("tool-version-installed=\n"));
        assert!(rendered.contains("dependency-cache-hit=true\n"));
    }

    #[tokio::test]
    async fn appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("github_output");
        std::fs::write(&path, "previous=step\n").unwrap();

        outputs(true).publish(Some(&path)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("previous=step\n"));
        assert!(content.contains("binary-cache-hit=true\n"));
        assert!(content.contains("build-duration-seconds=0\n"));
    }
}
