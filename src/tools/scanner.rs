//! cargo-audit vulnerability scanner

use crate::error::{SetupError, SetupResult};
use crate::tools::{AuditReport, AuditStatus, VulnerabilityScanner};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Advisory {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Finding {
    advisory: Option<Advisory>,
}

#[derive(Debug, Default, Deserialize)]
struct Vulnerabilities {
    #[serde(default)]
    list: Vec<Finding>,
}

#[derive(Debug, Deserialize)]
struct AuditJson {
    #[serde(default)]
    vulnerabilities: Vulnerabilities,
    /// Keyed by kind: unmaintained, unsound, yanked
    #[serde(default)]
    warnings: std::collections::BTreeMap<String, Vec<Finding>>,
}

fn finding_ids<'a>(findings: &'a [Finding], kind: &str) -> impl Iterator<Item = String> + 'a {
    let kind = kind.to_string();
    findings.iter().map(move |f| match &f.advisory {
        Some(a) => a.id.clone(),
        None => kind.clone(),
    })
}

/// Parse `cargo audit --json` output into a report.
///
/// Vulnerabilities make the status `fail`, warnings alone make it `warn`.
pub fn parse_audit_json(json: &str) -> SetupResult<AuditReport> {
    let parsed: AuditJson = serde_json::from_str(json)?;

    let mut findings: Vec<String> = finding_ids(&parsed.vulnerabilities.list, "vulnerability").collect();
    let vulnerable = !findings.is_empty();
    for (kind, list) in &parsed.warnings {
        findings.extend(finding_ids(list, kind));
    }

    let status = if vulnerable {
        AuditStatus::Fail
    } else if !findings.is_empty() {
        AuditStatus::Warn
    } else {
        AuditStatus::Pass
    };

    Ok(AuditReport { status, findings })
}

/// Runs `cargo audit` against the checkout's lockfile
#[derive(Debug, Clone, Default)]
pub struct CargoAudit;

impl CargoAudit {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VulnerabilityScanner for CargoAudit {
    async fn is_available(&self) -> bool {
        Command::new("cargo")
            .args(["audit", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn audit(&self, source_dir: &Path, deny_warnings: bool) -> SetupResult<AuditReport> {
        let mut args = vec!["audit", "--json"];
        if deny_warnings {
            args.extend(["--deny", "warnings"]);
        }
        debug!("Executing in {}: cargo {:?}", source_dir.display(), args);

        let output = Command::new("cargo")
            .args(&args)
            .current_dir(source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SetupError::command_failed("cargo audit", e))?;

        // A non-zero exit with findings still prints the JSON report
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Err(SetupError::command_exec(
                "cargo audit",
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        parse_audit_json(&stdout)
    }
}
