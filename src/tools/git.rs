//! git-backed source control

use crate::error::{SetupError, SetupResult};
use crate::tools::{CloneInfo, SourceControl};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Source control through the `git` CLI
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// Execute a git command and return the output
    async fn exec(&self, args: &[&str]) -> SetupResult<std::process::Output> {
        debug!("Executing: git {:?}", args);

        Command::new("git")
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SetupError::command_failed(format!("git {:?}", args), e))
    }

    async fn exec_in(&self, dir: &Path, args: &[&str]) -> SetupResult<std::process::Output> {
        let dir = dir.to_string_lossy();
        let mut full = vec!["-C", dir.as_ref()];
        full.extend_from_slice(args);
        self.exec(&full).await
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn tag_exists(&self, repo_url: &str, tag: &str) -> SetupResult<bool> {
        let refname = format!("refs/tags/{}", tag);
        let output = self
            .exec(&["ls-remote", "--tags", "--exit-code", repo_url, &refname])
            .await?;

        // --exit-code returns 2 when no matching ref was found
        match output.status.code() {
            Some(0) => Ok(true),
            Some(2) => Ok(false),
            _ => Err(SetupError::command_exec(
                format!("git ls-remote {}", repo_url),
                String::from_utf8_lossy(&output.stderr).trim(),
            )),
        }
    }

    async fn shallow_clone(&self, repo_url: &str, tag: &str, dest: &Path) -> SetupResult<CloneInfo> {
        let clone_err = |reason: String| SetupError::CloneError {
            repo: repo_url.to_string(),
            tag: tag.to_string(),
            reason,
        };

        if dest.exists() {
            debug!("Removing stale checkout {}", dest.display());
            tokio::fs::remove_dir_all(dest)
                .await
                .map_err(|e| clone_err(format!("removing {}: {}", dest.display(), e)))?;
        }

        let dest_str = dest.to_string_lossy();
        let output = self
            .exec(&[
                "-c",
                "advice.detachedHead=false",
                "clone",
                "--depth",
                "1",
                "--single-branch",
                "--branch",
                tag,
                repo_url,
                dest_str.as_ref(),
            ])
            .await?;

        if !output.status.success() {
            return Err(clone_err(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let output = self.exec_in(dest, &["rev-parse", "HEAD"]).await?;
        if !output.status.success() {
            return Err(clone_err("could not resolve HEAD".to_string()));
        }
        let commit_sha = String::from_utf8_lossy(&output.stdout).trim().to_string();

        info!("Cloned {} at {} ({})", repo_url, tag, commit_sha);
        Ok(CloneInfo { commit_sha })
    }

    async fn tags_at_head(&self, dir: &Path) -> SetupResult<Vec<String>> {
        let output = self
            .exec_in(dir, &["tag", "--points-at", "HEAD"])
            .await?;

        if !output.status.success() {
            return Err(SetupError::command_exec(
                format!("git tag --points-at HEAD in {}", dir.display()),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(parse_tag_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn verify_tag(&self, dir: &Path, tag: &str) -> SetupResult<bool> {
        let output = self.exec_in(dir, &["verify-tag", tag]).await?;
        if !output.status.success() {
            debug!(
                "git verify-tag {}: {}",
                tag,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.status.success())
    }
}

/// One tag per line, blank lines dropped
fn parse_tag_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
