//! Release verification
//!
//! Pre-flight checks run by a human before bumping the pinned version.
//! Probes run in order; a fatal probe halts the pipeline and leaves every
//! later field at its default.
//!
//! | Probe | On failure |
//! |-------|------------|
//! | tag exists on remote | halt |
//! | shallow clone of the tag | halt |
//! | tag signature | recorded |
//! | release attestation asset | recorded |
//! | `Cargo.lock` present | halt |
//! | vulnerability audit | recorded |
//!
//! The recommendation depends only on the signature and attestation probes.

use crate::error::{SetupError, SetupResult};
use crate::params::normalize_version;
use crate::tools::{
    is_attestation_asset, AuditStatus, ReleaseAssets, SourceControl, VulnerabilityScanner,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

const LOCKFILE: &str = "Cargo.lock";

/// Advice derived from provenance probes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    /// Release provenance could be established
    Safe,
    /// Only a source build is acceptable
    #[default]
    Caution,
}

impl Recommendation {
    /// `safe` iff the tag is signed or the release carries an attestation
    pub fn from_provenance(gpg_signed: bool, slsa_attested: bool) -> Self {
        if gpg_signed || slsa_attested {
            Self::Safe
        } else {
            Self::Caution
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => f.write_str("safe"),
            Self::Caution => f.write_str("caution"),
        }
    }
}

/// Everything the verifier found out about one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub version: String,
    pub tag: String,
    pub repo_url: String,
    pub tag_exists: bool,
    pub clone_ok: bool,
    pub commit_sha: String,
    pub gpg_signed: bool,
    pub slsa_attested: bool,
    pub lockfile_present: bool,
    pub lockfile_sha256: String,
    pub audit_status: AuditStatus,
    pub audit_findings: Vec<String>,
    pub recommendation: Recommendation,
    /// Stage that halted verification, if any
    pub halted: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl VerificationReport {
    pub(crate) fn new(repo_url: &str, version: &str) -> Self {
        Self {
            version: version.to_string(),
            tag: format!("v{}", version),
            repo_url: repo_url.to_string(),
            tag_exists: false,
            clone_ok: false,
            commit_sha: String::new(),
            gpg_signed: false,
            slsa_attested: false,
            lockfile_present: false,
            lockfile_sha256: String::new(),
            audit_status: AuditStatus::Skip,
            audit_findings: Vec::new(),
            recommendation: Recommendation::default(),
            halted: None,
            checked_at: Utc::now(),
        }
    }
}

/// A halted verification with the partial report
#[derive(Debug, Error)]
#[error("verification halted at {stage}: {error}")]
pub struct VerifyFailure {
    pub stage: &'static str,
    pub report: VerificationReport,
    #[source]
    pub error: SetupError,
}

/// Runs the probe sequence against an upstream repository
pub struct ReleaseVerifier<'a> {
    source: &'a dyn SourceControl,
    releases: &'a dyn ReleaseAssets,
    scanner: &'a dyn VulnerabilityScanner,
    run_audit: bool,
}

impl<'a> ReleaseVerifier<'a> {
    pub fn new(
        source: &'a dyn SourceControl,
        releases: &'a dyn ReleaseAssets,
        scanner: &'a dyn VulnerabilityScanner,
    ) -> Self {
        Self {
            source,
            releases,
            scanner,
            run_audit: true,
        }
    }

    pub fn with_audit(mut self, run_audit: bool) -> Self {
        self.run_audit = run_audit;
        self
    }

    /// Verify `version` of `repo_url`, cloning into `workdir`
    pub async fn verify(
        &self,
        repo_url: &str,
        version: &str,
        workdir: &Path,
    ) -> Result<VerificationReport, VerifyFailure> {
        let version = normalize_version(version).map_err(|error| {
            let mut report = VerificationReport::new(repo_url, version);
            report.halted = Some("parameters".to_string());
            VerifyFailure {
                stage: "parameters",
                report,
                error,
            }
        })?;
        let mut report = VerificationReport::new(repo_url, &version);
        let tag = report.tag.clone();

        macro_rules! halt {
            ($stage:expr, $error:expr) => {{
                report.halted = Some($stage.to_string());
                return Err(VerifyFailure {
                    stage: $stage,
                    report,
                    error: $error,
                });
            }};
        }

        // 1. Tag existence
        match self.source.tag_exists(repo_url, &tag).await {
            Ok(true) => report.tag_exists = true,
            Ok(false) => halt!(
                "tag",
                SetupError::TagMismatch {
                    expected: tag.clone(),
                    actual: "no such tag on remote".to_string(),
                }
            ),
            Err(e) => halt!("tag", e),
        }
        info!("Tag {} exists", tag);

        // 2. Clone
        let checkout = workdir.join(format!("leo-{}", version));
        match self.source.shallow_clone(repo_url, &tag, &checkout).await {
            Ok(clone) => {
                report.clone_ok = true;
                report.commit_sha = clone.commit_sha;
            }
            Err(e) => halt!("clone", e),
        }

        // 3. Signature
        report.gpg_signed = match self.source.verify_tag(&checkout, &tag).await {
            Ok(signed) => signed,
            Err(e) => {
                debug!("Signature check failed to run: {}", e);
                false
            }
        };
        if !report.gpg_signed {
            warn!("Tag {} is not signed", tag);
        }

        // 4. Provenance attestation
        report.slsa_attested = match self.releases.asset_names(repo_url, &tag).await {
            Ok(names) => names.iter().any(|n| is_attestation_asset(n)),
            Err(e) => {
                warn!("Could not list release assets: {}", e);
                false
            }
        };
        if !report.slsa_attested {
            warn!("Release {} has no attestation", tag);
        }
        report.recommendation =
            Recommendation::from_provenance(report.gpg_signed, report.slsa_attested);

        // 5. Lockfile
        let lockfile = checkout.join(LOCKFILE);
        match hash_lockfile(&lockfile) {
            Ok(Some(hash)) => {
                report.lockfile_present = true;
                report.lockfile_sha256 = hash;
            }
            Ok(None) => halt!("lockfile", SetupError::LockfileMissing(checkout.clone())),
            Err(e) => halt!("lockfile", e),
        }

        // 6. Audit
        let (status, findings) = self.audit(&checkout).await;
        report.audit_status = status;
        report.audit_findings = findings;

        info!(
            "Verified {}: recommendation {}",
            tag, report.recommendation
        );
        Ok(report)
    }

    async fn audit(&self, checkout: &Path) -> (AuditStatus, Vec<String>) {
        if !self.run_audit {
            return (AuditStatus::Skip, Vec::new());
        }
        if !self.scanner.is_available().await {
            warn!("Vulnerability scanner not available; audit skipped");
            return (AuditStatus::Skip, Vec::new());
        }

        match self.scanner.audit(checkout, false).await {
            Ok(report) if report.findings.is_empty() => (AuditStatus::Pass, Vec::new()),
            Ok(report) => (AuditStatus::Warn, report.findings),
            Err(e) => {
                warn!("Vulnerability audit failed: {}", e);
                (AuditStatus::Fail, Vec::new())
            }
        }
    }
}

/// SHA-256 of the lockfile, or `None` if it does not exist
fn hash_lockfile(path: &Path) -> SetupResult<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read(path)
        .map_err(|e| SetupError::io(format!("reading lockfile {}", path.display()), e))?;
    Ok(Some(hex::encode(Sha256::digest(&contents))))
}
