//! In-memory collaborators for orchestrator and verifier tests

use crate::cache::key::CacheKey;
use crate::cache::store::{ArtifactCache, RestoreResult};
use crate::error::{SetupError, SetupResult};
use crate::tools::{
    AuditReport, AuditStatus, BuildOptions, BuildTool, CloneInfo, OutputSink, ReleaseAssets,
    SourceControl, ToolchainInstaller, VulnerabilityScanner,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const FAKE_COMMIT: &str = "4f2c9e1d8a7b6c5d4e3f2a1b0c9d8e7f6a5b4c3d";

/// Key-only cache with the same lookup rules as the local store
#[derive(Debug, Default)]
pub struct FakeCache {
    entries: Mutex<Vec<String>>,
    saves: Mutex<Vec<String>>,
    restores: AtomicUsize,
    reject_saves: bool,
    fail_restores: bool,
}

impl FakeCache {
    pub fn rejecting_saves() -> Self {
        Self {
            reject_saves: true,
            ..Self::default()
        }
    }

    pub fn failing_restores() -> Self {
        Self {
            fail_restores: true,
            ..Self::default()
        }
    }

    pub fn saved_keys(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }

    pub fn restore_calls(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }

    pub fn forget_binaries(&self) {
        self.entries
            .lock()
            .unwrap()
            .retain(|k| !k.starts_with("leo-binary"));
    }
}

#[async_trait]
impl ArtifactCache for FakeCache {
    async fn restore(
        &self,
        key: &CacheKey,
        fallback_keys: &[CacheKey],
        _paths: &[PathBuf],
    ) -> SetupResult<RestoreResult> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        if self.fail_restores {
            return Err(SetupError::CacheRestore {
                key: key.to_string(),
                reason: "service unavailable".to_string(),
            });
        }

        let entries = self.entries.lock().unwrap();
        if entries.iter().any(|e| e == key.as_str()) {
            return Ok(RestoreResult::matched(key.as_str()));
        }
        for fallback in fallback_keys {
            if let Some(found) = entries.iter().rev().find(|e| fallback.is_prefix_of(e)) {
                return Ok(RestoreResult::matched(found.clone()));
            }
        }
        Ok(RestoreResult::miss())
    }

    async fn save(&self, key: &CacheKey, _paths: &[PathBuf]) -> SetupResult<()> {
        if self.reject_saves {
            return Err(SetupError::CacheSave {
                key: key.to_string(),
                reason: "quota exceeded".to_string(),
            });
        }
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e != key.as_str());
        entries.push(key.to_string());
        self.saves.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Remote with a single tag, optionally sharing its commit with others
#[derive(Debug)]
pub struct FakeSource {
    tag: String,
    sibling_tags: Vec<String>,
    reachable: bool,
    signed: bool,
    lockfile: bool,
}

impl FakeSource {
    pub fn with_tag(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            sibling_tags: Vec::new(),
            reachable: true,
            signed: false,
            lockfile: true,
        }
    }

    /// Tag is listed but fetching it fails
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::with_tag("v3.4.0")
        }
    }

    pub fn signed(self) -> Self {
        Self {
            signed: true,
            ..self
        }
    }

    /// Another tag on the same commit, listed ahead of the requested one
    pub fn with_sibling_tag(mut self, tag: &str) -> Self {
        self.sibling_tags.push(tag.to_string());
        self
    }

    pub fn without_lockfile(self) -> Self {
        Self {
            lockfile: false,
            ..self
        }
    }
}

#[async_trait]
impl SourceControl for FakeSource {
    async fn tag_exists(&self, _repo_url: &str, tag: &str) -> SetupResult<bool> {
        Ok(tag == self.tag)
    }

    async fn shallow_clone(&self, repo_url: &str, tag: &str, dest: &Path) -> SetupResult<CloneInfo> {
        if !self.reachable {
            return Err(SetupError::CloneError {
                repo: repo_url.to_string(),
                tag: tag.to_string(),
                reason: "could not resolve host".to_string(),
            });
        }
        std::fs::create_dir_all(dest).unwrap();
        if self.lockfile {
            std::fs::write(dest.join("Cargo.lock"), "version = 4\n").unwrap();
        }
        Ok(CloneInfo {
            commit_sha: FAKE_COMMIT.to_string(),
        })
    }

    async fn tags_at_head(&self, _dir: &Path) -> SetupResult<Vec<String>> {
        let mut tags = self.sibling_tags.clone();
        tags.push(self.tag.clone());
        Ok(tags)
    }

    async fn verify_tag(&self, _dir: &Path, _tag: &str) -> SetupResult<bool> {
        Ok(self.signed)
    }
}

#[derive(Debug, Default)]
pub struct FakeToolchain {
    installed: Mutex<Vec<String>>,
}

impl FakeToolchain {
    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolchainInstaller for FakeToolchain {
    async fn ensure(&self, toolchain: &str) -> SetupResult<()> {
        self.installed.lock().unwrap().push(toolchain.to_string());
        Ok(())
    }
}

/// Writes a placeholder binary into its target directory
#[derive(Debug)]
pub struct FakeBuild {
    target_dir: PathBuf,
    fail: bool,
    builds: AtomicUsize,
}

impl FakeBuild {
    pub fn new(target_dir: PathBuf) -> Self {
        Self {
            target_dir,
            fail: false,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn failing(self) -> Self {
        Self { fail: true, ..self }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildTool for FakeBuild {
    async fn build(
        &self,
        _source_dir: &Path,
        options: BuildOptions,
        on_output: OutputSink<'_>,
    ) -> SetupResult<PathBuf> {
        assert!(options.locked, "builds must always be locked");
        self.builds.fetch_add(1, Ordering::SeqCst);
        on_output("   Compiling leo-lang v3.4.0".to_string());

        if self.fail {
            return Err(SetupError::BuildFailed {
                output: "error: failed to compile `leo-lang`".to_string(),
            });
        }

        let artifact = self.target_dir.join("release").join("leo");
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::write(&artifact, b"#!/bin/sh\necho leo 3.4.0\n").unwrap();
        Ok(artifact)
    }

    fn dependency_paths(&self) -> Vec<PathBuf> {
        vec![self.target_dir.clone()]
    }
}

#[derive(Debug)]
pub struct FakeScanner {
    available: bool,
    report: Option<AuditReport>,
}

impl FakeScanner {
    pub fn clean() -> Self {
        Self {
            available: true,
            report: Some(AuditReport {
                status: AuditStatus::Pass,
                findings: Vec::new(),
            }),
        }
    }

    pub fn with_findings(status: AuditStatus, ids: &[&str]) -> Self {
        Self {
            available: true,
            report: Some(AuditReport {
                status,
                findings: ids.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            report: None,
        }
    }

    /// Installed, but every run errors
    pub fn broken() -> Self {
        Self {
            available: true,
            report: None,
        }
    }
}

#[async_trait]
impl VulnerabilityScanner for FakeScanner {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn audit(&self, _source_dir: &Path, _deny_warnings: bool) -> SetupResult<AuditReport> {
        self.report
            .clone()
            .ok_or_else(|| SetupError::command_exec("cargo audit", "advisory database unreachable"))
    }
}

#[derive(Debug, Default)]
pub struct FakeReleases {
    assets: Vec<String>,
    fail: bool,
}

impl FakeReleases {
    pub fn with_assets(names: &[&str]) -> Self {
        Self {
            assets: names.iter().map(|s| s.to_string()).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            assets: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ReleaseAssets for FakeReleases {
    async fn asset_names(&self, _repo_url: &str, _tag: &str) -> SetupResult<Vec<String>> {
        if self.fail {
            return Err(SetupError::Http {
                url: "https://api.github.com".to_string(),
                reason: "rate limited".to_string(),
            });
        }
        Ok(self.assets.clone())
    }
}
