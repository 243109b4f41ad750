//! Verify command - check a release before pinning it

use crate::audit::{RunEvent, RunHistory};
use crate::cli::args::VerifyArgs;
use crate::config::Config;
use crate::error::{SetupError, SetupResult};
use crate::tools::{AuditStatus, CargoAudit, GitCli, GithubReleases};
use crate::ui::{self, Mark, TaskSpinner, UiContext};
use crate::verify::{Recommendation, ReleaseVerifier, VerificationReport, VerifyFailure};
use tracing::info;

/// Execute the verify command
pub async fn execute(args: VerifyArgs, config: &Config) -> SetupResult<()> {
    let ctx = if args.json {
        UiContext::non_interactive()
    } else {
        UiContext::detect()
    };
    let history = RunHistory::new(config);
    let repo_url = args
        .repo_url
        .clone()
        .unwrap_or_else(|| config.install.repo_url.clone());

    let workdir = tempfile::Builder::new()
        .prefix("leo-setup-verify-")
        .tempdir()
        .map_err(|e| SetupError::io("creating verification directory", e))?;

    let source = GitCli::new();
    let releases = GithubReleases::new(args.github_token.clone());
    let scanner = CargoAudit::new();
    let verifier = ReleaseVerifier::new(&source, &releases, &scanner)
        .with_audit(config.audit.enabled && !args.no_audit);

    let mut spinner = TaskSpinner::new(&ctx);
    if !args.json {
        spinner.start(&format!("Verifying {} {}...", repo_url, args.version));
    }
    let result = verifier.verify(&repo_url, &args.version, workdir.path()).await;

    let (report, error) = match result {
        Ok(report) => {
            spinner.clear();
            (report, None)
        }
        Err(VerifyFailure {
            stage,
            report,
            error,
        }) => {
            if !args.json {
                spinner.stop_error(&format!("Verification halted at {}", stage));
            }
            (report, Some(error))
        }
    };

    history
        .record(&RunEvent::verify(&report, error.as_ref()))
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&ctx, &report);
    }

    if args.keep {
        let kept = workdir.keep();
        info!("Kept verification checkout at {}", kept.display());
        if !args.json {
            ui::note(&ctx, &format!("Checkout kept at {}", kept.display()));
        }
    }

    match error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn print_report(ctx: &UiContext, report: &VerificationReport) {
    ui::banner(ctx, &format!("Release {} ({})", report.tag, report.repo_url));

    ui::probe(ctx, "tag exists", yes_no(report.tag_exists), report.tag_exists);
    ui::probe(ctx, "clone", yes_no(report.clone_ok), report.clone_ok);
    if !report.commit_sha.is_empty() {
        ui::fact(ctx, "commit", &report.commit_sha);
    }
    ui::probe(ctx, "gpg signed", yes_no(report.gpg_signed), report.gpg_signed);
    ui::probe(
        ctx,
        "slsa attested",
        yes_no(report.slsa_attested),
        report.slsa_attested,
    );
    ui::probe(
        ctx,
        "lockfile",
        yes_no(report.lockfile_present),
        report.lockfile_present,
    );
    if report.lockfile_present {
        ui::fact(ctx, "lockfile sha256", &report.lockfile_sha256);
    }
    ui::probe(
        ctx,
        "audit",
        &report.audit_status.to_string(),
        matches!(report.audit_status, AuditStatus::Pass | AuditStatus::Skip),
    );
    for finding in &report.audit_findings {
        ui::note(ctx, finding);
    }

    if report.halted.is_some() {
        return;
    }
    match report.recommendation {
        Recommendation::Safe => ui::finish(ctx, Mark::Ok, "Recommendation: safe"),
        Recommendation::Caution => {
            ui::step_detail(
                ctx,
                Mark::Warn,
                "No signature or attestation found",
                "install from source only",
            );
            ui::finish(ctx, Mark::Warn, "Recommendation: caution");
        }
    }
}
