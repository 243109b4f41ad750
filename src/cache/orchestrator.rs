//! Install run orchestration
//!
//! One run walks a fixed sequence of stages:
//!
//! ```text
//! start -> binary restore -+-> hit  ------------------------------------------------> done
//!                          +-> miss -> toolchain -> dependency restore -> clone -> audit
//!                                   -> build -> install -> save decision -----------> done
//! ```
//!
//! Cache-layer failures degrade to "miss" or "skip save". Everything from
//! the toolchain stage through install is fatal and surfaced unchanged.

use crate::cache::key::CacheKeySet;
use crate::cache::store::ArtifactCache;
use crate::error::{SetupError, SetupResult};
use crate::params::InstallRequest;
use crate::tools::{
    BuildOptions, BuildTool, OutputSink, SourceControl, ToolchainInstaller, VulnerabilityScanner,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What happened during one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheOutcome {
    pub binary_hit: bool,
    pub dependency_hit: bool,
    pub build_performed: bool,
    pub build_duration_seconds: u64,
    pub saved_binary: bool,
    pub saved_dependency: bool,
}

/// A fatal error together with the outcome accumulated before it
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub outcome: CacheOutcome,
    #[source]
    pub error: SetupError,
}

/// The external services a run talks to
pub struct Collaborators<'a> {
    pub cache: &'a dyn ArtifactCache,
    pub source: &'a dyn SourceControl,
    pub toolchain: &'a dyn ToolchainInstaller,
    pub builder: &'a dyn BuildTool,
    pub scanner: &'a dyn VulnerabilityScanner,
}

/// Drives one install run for a request
pub struct CacheOrchestrator<'a> {
    request: &'a InstallRequest,
    keys: CacheKeySet,
    tools: Collaborators<'a>,
    on_build_output: OutputSink<'a>,
}

fn discard_output(_: String) {}

impl<'a> CacheOrchestrator<'a> {
    pub fn new(request: &'a InstallRequest, tools: Collaborators<'a>) -> SetupResult<Self> {
        Ok(Self {
            keys: CacheKeySet::build(request)?,
            request,
            tools,
            on_build_output: &discard_output,
        })
    }

    /// Forward build output lines to `sink`
    pub fn with_build_output(mut self, sink: OutputSink<'a>) -> Self {
        self.on_build_output = sink;
        self
    }

    pub fn keys(&self) -> &CacheKeySet {
        &self.keys
    }

    fn binary_paths(&self) -> Vec<PathBuf> {
        vec![self.request.binary_path()]
    }

    /// Run every stage and report the outcome
    pub async fn run(&self) -> Result<CacheOutcome, RunFailure> {
        let mut outcome = CacheOutcome::default();

        if self.restore_binary().await {
            outcome.binary_hit = true;
            info!(
                "Binary cache hit for {}; skipping build",
                self.keys.binary_key
            );
            return Ok(outcome);
        }

        let result = self.build_path(&mut outcome).await;
        self.save_caches(&mut outcome, result.is_ok()).await;

        match result {
            Ok(()) => Ok(outcome),
            Err(error) => Err(RunFailure { outcome, error }),
        }
    }

    async fn restore_binary(&self) -> bool {
        if !self.request.cache_enabled() {
            debug!("Caching disabled; skipping binary restore");
            return false;
        }

        match self
            .tools
            .cache
            .restore(&self.keys.binary_key, &[], &self.binary_paths())
            .await
        {
            Ok(result) => result.hit,
            Err(e) => {
                warn!("Binary cache restore failed, treating as miss: {}", e);
                false
            }
        }
    }

    async fn restore_dependencies(&self) -> bool {
        if !self.request.cache_enabled() {
            return false;
        }

        let paths = self.tools.builder.dependency_paths();
        match self
            .tools
            .cache
            .restore(&self.keys.dependency_key, self.keys.dependency_fallbacks(), &paths)
            .await
        {
            Ok(result) => {
                if let Some(matched) = &result.matched_key {
                    if !result.is_exact(&self.keys.dependency_key) {
                        info!("Dependency cache restored from fallback {}", matched);
                    }
                }
                result.hit
            }
            Err(e) => {
                warn!("Dependency cache restore failed, treating as miss: {}", e);
                false
            }
        }
    }

    async fn build_path(&self, outcome: &mut CacheOutcome) -> SetupResult<()> {
        let req = self.request;

        self.tools.toolchain.ensure(req.toolchain_version()).await?;

        outcome.dependency_hit = self.restore_dependencies().await;

        let tag = req.tag();
        let source_dir = req.source_dir();
        let clone = self
            .tools
            .source
            .shallow_clone(req.repo_url(), &tag, &source_dir)
            .await?;
        let tags = self.tools.source.tags_at_head(&source_dir).await?;
        if !tags.iter().any(|t| *t == tag) {
            let actual = if tags.is_empty() {
                format!("untagged commit {}", clone.commit_sha)
            } else {
                tags.join(", ")
            };
            return Err(SetupError::TagMismatch {
                expected: tag,
                actual,
            });
        }

        if req.run_audit() {
            self.audit(&source_dir).await?;
        }

        let started = Instant::now();
        let artifact = self
            .tools
            .builder
            .build(&source_dir, BuildOptions::default(), self.on_build_output)
            .await?;
        install_artifact(&artifact, &req.binary_path()).await?;

        outcome.build_performed = true;
        outcome.build_duration_seconds = started.elapsed().as_secs();
        info!(
            "Installed leo {} to {} in {}s",
            req.tool_version(),
            req.binary_path().display(),
            outcome.build_duration_seconds
        );
        Ok(())
    }

    async fn audit(&self, source_dir: &Path) -> SetupResult<()> {
        let deny = self.request.audit_deny_warnings();
        let scanner = self.tools.scanner;

        if !scanner.is_available().await {
            warn!("Vulnerability scanner not available; skipping audit");
            return Ok(());
        }

        let report = match scanner.audit(source_dir, deny).await {
            Ok(report) => report,
            Err(e) if deny => return Err(e),
            Err(e) => {
                warn!("Vulnerability audit could not run: {}", e);
                return Ok(());
            }
        };

        if report.findings.is_empty() {
            info!("Vulnerability audit passed");
            return Ok(());
        }
        if deny {
            return Err(SetupError::AuditFailed {
                count: report.findings.len(),
                findings: report.findings.join(", "),
            });
        }
        for finding in &report.findings {
            warn!("Audit finding: {}", finding);
        }
        Ok(())
    }

    async fn save_caches(&self, outcome: &mut CacheOutcome, build_succeeded: bool) {
        let policy = self.request.cache_save_policy();
        if !self.request.cache_enabled() || !policy.should_save(build_succeeded) {
            debug!(
                "Not saving caches (policy {}, build succeeded: {})",
                policy, build_succeeded
            );
            return;
        }

        // Whatever sits at the install path after a failed build is not this version
        if outcome.build_performed {
            outcome.saved_binary = self.save(&self.keys.binary_key, &self.binary_paths()).await;
        } else {
            debug!("Nothing installed by this run; skipping binary cache save");
        }
        outcome.saved_dependency = self
            .save(&self.keys.dependency_key, &self.tools.builder.dependency_paths())
            .await;
    }

    async fn save(&self, key: &crate::cache::key::CacheKey, paths: &[PathBuf]) -> bool {
        match self.tools.cache.save(key, paths).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Cache save skipped: {}", e);
                false
            }
        }
    }
}

/// Copy the built binary into place
async fn install_artifact(artifact: &Path, target: &Path) -> SetupResult<()> {
    let install_err = |reason: String| SetupError::InstallFailed {
        artifact: artifact.to_path_buf(),
        dir: target.parent().map(Path::to_path_buf).unwrap_or_default(),
        reason,
    };

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| install_err(e.to_string()))?;
    }
    tokio::fs::copy(artifact, target)
        .await
        .map_err(|e| install_err(e.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(target, perms)
            .await
            .map_err(|e| install_err(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{RawParams, SavePolicy};
    use crate::cache::store::LocalCache;
    use crate::testing::{FakeBuild, FakeCache, FakeScanner, FakeSource, FakeToolchain};
    use crate::tools::AuditStatus;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        cache: FakeCache,
        source: FakeSource,
        toolchain: FakeToolchain,
        builder: FakeBuild,
        scanner: FakeScanner,
    }

    impl Harness {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let builder = FakeBuild::new(dir.path().join("target"));
            Self {
                dir,
                cache: FakeCache::default(),
                source: FakeSource::with_tag("v3.4.0"),
                toolchain: FakeToolchain::default(),
                builder,
                scanner: FakeScanner::clean(),
            }
        }

        fn request(&self, policy: SavePolicy) -> InstallRequest {
            InstallRequest::from_raw(RawParams {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                cache_save_policy: policy.to_string(),
                working_directory: self.dir.path().join("work"),
                install_dir: self.dir.path().join("bin"),
                ..RawParams::for_version("3.4.0")
            })
            .unwrap()
        }

        fn tools(&self) -> Collaborators<'_> {
            Collaborators {
                cache: &self.cache,
                source: &self.source,
                toolchain: &self.toolchain,
                builder: &self.builder,
                scanner: &self.scanner,
            }
        }

        fn keys(&self) -> CacheKeySet {
            CacheKeySet::build(&self.request(SavePolicy::Always)).unwrap()
        }

        async fn run(&self, req: &InstallRequest) -> Result<CacheOutcome, RunFailure> {
            CacheOrchestrator::new(req, self.tools()).unwrap().run().await
        }
    }

    #[tokio::test]
    async fn cold_cache_builds_and_saves() {
        let h = Harness::new();
        let req = h.request(SavePolicy::OnSuccess);

        let outcome = h.run(&req).await.unwrap();

        assert!(!outcome.binary_hit);
        assert!(!outcome.dependency_hit);
        assert!(outcome.build_performed);
        assert!(outcome.saved_binary);
        assert!(outcome.saved_dependency);
        assert!(req.binary_path().exists());
        assert_eq!(h.toolchain.installed(), vec!["stable"]);
    }

    #[tokio::test]
    async fn warm_cache_skips_build() {
        let h = Harness::new();
        let req = h.request(SavePolicy::OnSuccess);

        h.run(&req).await.unwrap();
        let second = h.run(&req).await.unwrap();

        assert!(second.binary_hit);
        assert!(!second.build_performed);
        assert_eq!(second.build_duration_seconds, 0);
        assert!(!second.saved_binary);
        assert_eq!(h.builder.build_count(), 1);
        assert_eq!(h.toolchain.installed().len(), 1);
    }

    #[tokio::test]
    async fn toolchain_bump_reuses_dependency_cache_by_prefix() {
        let h = Harness::new();
        h.run(&h.request(SavePolicy::OnSuccess)).await.unwrap();
        h.cache.forget_binaries();

        let bumped = InstallRequest::from_raw(RawParams {
            toolchain_version: "1.83.0".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            working_directory: h.dir.path().join("work"),
            install_dir: h.dir.path().join("bin"),
            ..RawParams::for_version("3.4.0")
        })
        .unwrap();
        let outcome = h.run(&bumped).await.unwrap();

        assert!(outcome.dependency_hit);
        assert!(outcome.build_performed);
    }

    #[tokio::test]
    async fn never_policy_saves_nothing() {
        let h = Harness::new();
        let outcome = h.run(&h.request(SavePolicy::Never)).await.unwrap();

        assert!(outcome.build_performed);
        assert!(!outcome.saved_binary);
        assert!(!outcome.saved_dependency);
        assert!(h.cache.saved_keys().is_empty());
    }

    #[tokio::test]
    async fn on_success_policy_skips_save_after_build_failure() {
        let mut h = Harness::new();
        h.builder = h.builder.failing();
        let failure = h.run(&h.request(SavePolicy::OnSuccess)).await.unwrap_err();

        assert!(matches!(failure.error, SetupError::BuildFailed { .. }));
        assert!(!failure.outcome.build_performed);
        assert!(!failure.outcome.saved_binary);
        assert!(!failure.outcome.saved_dependency);
    }

    #[tokio::test]
    async fn always_policy_saves_only_dependencies_after_build_failure() {
        let mut h = Harness::new();
        h.builder = h.builder.failing();
        let failure = h.run(&h.request(SavePolicy::Always)).await.unwrap_err();

        assert!(matches!(failure.error, SetupError::BuildFailed { .. }));
        assert!(!failure.outcome.saved_binary);
        assert!(failure.outcome.saved_dependency);
        assert_eq!(h.cache.saved_keys(), vec![h.keys().dependency_key.to_string()]);
    }

    #[tokio::test]
    async fn always_policy_never_caches_a_previous_install() {
        let h = Harness::new();
        let req = h.request(SavePolicy::Always);
        let store = LocalCache::new(h.dir.path().join("store"));

        // An older leo already occupies the install path
        std::fs::create_dir_all(h.dir.path().join("bin")).unwrap();
        std::fs::write(req.binary_path(), b"leo 3.3.0").unwrap();

        let failing = FakeBuild::new(h.dir.path().join("target")).failing();
        let tools = Collaborators {
            cache: &store,
            builder: &failing,
            ..h.tools()
        };
        let failure = CacheOrchestrator::new(&req, tools)
            .unwrap()
            .run()
            .await
            .unwrap_err();
        assert!(!failure.outcome.saved_binary);
        assert!(store
            .entries()
            .unwrap()
            .iter()
            .all(|e| !e.key.starts_with("leo-binary")));

        let tools = Collaborators {
            cache: &store,
            ..h.tools()
        };
        let outcome = CacheOrchestrator::new(&req, tools)
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(!outcome.binary_hit);
        assert!(outcome.build_performed);
        assert_eq!(
            std::fs::read(req.binary_path()).unwrap(),
            b"#!/bin/sh\necho leo 3.4.0\n"
        );
    }

    #[tokio::test]
    async fn save_failure_is_not_fatal() {
        let mut h = Harness::new();
        h.cache = FakeCache::rejecting_saves();
        let outcome = h.run(&h.request(SavePolicy::Always)).await.unwrap();

        assert!(outcome.build_performed);
        assert!(!outcome.saved_binary);
        assert!(!outcome.saved_dependency);
    }

    #[tokio::test]
    async fn restore_failure_is_a_miss() {
        let mut h = Harness::new();
        h.cache = FakeCache::failing_restores();
        let outcome = h.run(&h.request(SavePolicy::OnSuccess)).await.unwrap();

        assert!(!outcome.binary_hit);
        assert!(!outcome.dependency_hit);
        assert!(outcome.build_performed);
    }

    #[tokio::test]
    async fn tag_mismatch_aborts_before_build() {
        let mut h = Harness::new();
        h.source = FakeSource::with_tag("v3.3.9");
        let failure = h.run(&h.request(SavePolicy::OnSuccess)).await.unwrap_err();

        assert!(matches!(
            failure.error,
            SetupError::TagMismatch { ref expected, .. } if expected == "v3.4.0"
        ));
        assert_eq!(h.builder.build_count(), 0);
    }

    #[tokio::test]
    async fn other_tags_on_the_same_commit_are_accepted() {
        let mut h = Harness::new();
        h.source = FakeSource::with_tag("v3.4.0").with_sibling_tag("testnet-v3.4.0");
        let outcome = h.run(&h.request(SavePolicy::OnSuccess)).await.unwrap();
        assert!(outcome.build_performed);
    }

    #[tokio::test]
    async fn audit_findings_denied_when_configured() {
        let mut h = Harness::new();
        h.scanner = FakeScanner::with_findings(AuditStatus::Warn, &["RUSTSEC-2024-0375"]);
        let req = InstallRequest::from_raw(RawParams {
            audit_deny_warnings: true,
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            working_directory: h.dir.path().join("work"),
            install_dir: h.dir.path().join("bin"),
            ..RawParams::for_version("3.4.0")
        })
        .unwrap();

        let failure = h.run(&req).await.unwrap_err();
        assert!(matches!(failure.error, SetupError::AuditFailed { count: 1, .. }));
        assert_eq!(h.builder.build_count(), 0);
    }

    #[tokio::test]
    async fn audit_findings_reported_only_by_default() {
        let mut h = Harness::new();
        h.scanner = FakeScanner::with_findings(AuditStatus::Fail, &["RUSTSEC-2023-0071"]);
        let outcome = h.run(&h.request(SavePolicy::OnSuccess)).await.unwrap();
        assert!(outcome.build_performed);
    }

    #[tokio::test]
    async fn missing_scanner_skips_audit() {
        let mut h = Harness::new();
        h.scanner = FakeScanner::unavailable();
        let outcome = h.run(&h.request(SavePolicy::OnSuccess)).await.unwrap();
        assert!(outcome.build_performed);
    }

    #[tokio::test]
    async fn cache_disabled_never_touches_cache() {
        let h = Harness::new();
        let req = InstallRequest::from_raw(RawParams {
            cache_enabled: false,
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            working_directory: h.dir.path().join("work"),
            install_dir: h.dir.path().join("bin"),
            ..RawParams::for_version("3.4.0")
        })
        .unwrap();

        h.run(&req).await.unwrap();
        let second = h.run(&req).await.unwrap();

        assert!(!second.binary_hit);
        assert!(second.build_performed);
        assert_eq!(h.cache.restore_calls(), 0);
        assert!(h.cache.saved_keys().is_empty());
    }

    #[tokio::test]
    async fn clone_failure_is_fatal() {
        let mut h = Harness::new();
        h.source = FakeSource::unreachable();
        let failure = h.run(&h.request(SavePolicy::OnSuccess)).await.unwrap_err();
        assert!(matches!(failure.error, SetupError::CloneError { .. }));
        assert_eq!(failure.error.stage(), "clone");
    }
}
