//! Install command - restore or build leo and publish step outputs

use super::{local_cache, raw_params};
use crate::audit::{RunEvent, RunHistory};
use crate::cache::{CacheOrchestrator, CacheOutcome, Collaborators, RunFailure};
use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::error::{SetupError, SetupResult};
use crate::outputs::RunOutputs;
use crate::params::{InstallRequest, RawParams};
use crate::tools::{CargoAudit, CargoBuild, GitCli, Rustup};
use crate::ui::{self, count_lock_packages, BuildProgress, InstallStage, Mark, UiContext};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// Build output directory, shared across versions so the dependency cache
/// survives re-clones
const TARGET_DIR: &str = ".leo-setup-target";

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> SetupResult<()> {
    let ctx = UiContext::detect();
    let history = RunHistory::new(config);

    let cargo_home = cargo_home(&args)?;
    let request = InstallRequest::from_raw(install_params(&args, config)?)?;
    ui::banner(&ctx, &format!("leo-setup install {}", request.tool_version()));

    let cache = local_cache(args.cache_dir.clone(), config);
    let source = GitCli::new();
    let toolchain = Rustup::new();
    let scanner = CargoAudit::new();
    let builder = CargoBuild::new(
        request.toolchain_version(),
        cargo_home,
        request.working_directory().join(TARGET_DIR),
        request.os().binary_name(),
    );

    // Created on the first build line, once the lockfile is on disk
    let progress: OnceLock<BuildProgress> = OnceLock::new();
    let label = format!("leo {}", request.tool_version());
    let lockfile = request.source_dir().join("Cargo.lock");
    let on_output = |line: String| {
        progress
            .get_or_init(|| BuildProgress::new(&ctx, &label, count_lock_packages(&lockfile)))
            .on_line(line)
    };

    let orchestrator = CacheOrchestrator::new(
        &request,
        Collaborators {
            cache: &cache,
            source: &source,
            toolchain: &toolchain,
            builder: &builder,
            scanner: &scanner,
        },
    )?
    .with_build_output(&on_output);

    let result = orchestrator.run().await;
    if let Some(progress) = progress.get() {
        progress.finish();
    }

    let (outcome, error) = match result {
        Ok(outcome) => (outcome, None),
        Err(RunFailure { outcome, error }) => (outcome, Some(error)),
    };

    report_outcome(&ctx, &request, &outcome);

    history
        .record(&RunEvent::install(&request, &outcome, error.as_ref()))
        .await;

    // Outputs are published for failed runs too
    let published = RunOutputs::new(&request, &outcome)
        .publish(args.output_file.as_deref())
        .await;

    match (error, published) {
        (Some(error), published) => {
            if let Err(e) = published {
                warn!("Could not publish step outputs: {}", e);
            }
            Err(error)
        }
        (None, Err(e)) => Err(e),
        (None, Ok(())) => {
            ui::finish(
                &ctx,
                Mark::Ok,
                &format!(
                    "leo {} installed to {}",
                    request.tool_version(),
                    request.binary_path().display()
                ),
            );
            Ok(())
        }
    }
}

/// CLI flags over config over defaults, with paths made absolute
fn install_params(args: &InstallArgs, config: &Config) -> SetupResult<RawParams> {
    let mut raw = raw_params(&args.params, config);

    if let Some(url) = &args.repo_url {
        raw.repo_url = url.clone();
    }
    if args.no_cache {
        raw.cache_enabled = false;
    }
    if let Some(policy) = &args.save_policy {
        raw.cache_save_policy = policy.clone();
    }
    if args.no_audit {
        raw.run_audit = false;
    }
    if args.deny_warnings {
        raw.audit_deny_warnings = true;
    }

    let working_directory = args
        .working_directory
        .clone()
        .or_else(|| config.install.working_directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let install_dir = args
        .install_dir
        .clone()
        .or_else(|| config.install.install_dir.clone())
        .unwrap_or(cargo_home(args)?.join("bin"));

    // cargo resolves a relative CARGO_TARGET_DIR against the checkout
    raw.working_directory = absolute(&working_directory)?;
    raw.install_dir = absolute(&install_dir)?;
    Ok(raw)
}

/// `--cargo-home` or `CARGO_HOME` from the invoking environment, else ~/.cargo
fn cargo_home(args: &InstallArgs) -> SetupResult<PathBuf> {
    let home = args
        .cargo_home
        .clone()
        .unwrap_or_else(CargoBuild::default_cargo_home);
    absolute(&home)
}

fn absolute(path: &Path) -> SetupResult<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| SetupError::io(format!("resolving {}", path.display()), e))
}

fn report_outcome(ctx: &UiContext, request: &InstallRequest, outcome: &CacheOutcome) {
    if outcome.binary_hit {
        ui::stage(
            ctx,
            InstallStage::BinaryRestore,
            Mark::Ok,
            &format!("restored leo {}", request.tool_version()),
        );
        return;
    }

    ui::stage(ctx, InstallStage::BinaryRestore, Mark::Info, "miss");
    if outcome.dependency_hit {
        ui::stage(ctx, InstallStage::DependencyRestore, Mark::Ok, "restored");
    } else {
        ui::stage(ctx, InstallStage::DependencyRestore, Mark::Info, "miss, building from scratch");
    }
    if outcome.build_performed {
        ui::stage(
            ctx,
            InstallStage::Build,
            Mark::Ok,
            &format!("{}s", outcome.build_duration_seconds),
        );
    } else {
        ui::stage(ctx, InstallStage::Build, Mark::Fail, "did not complete");
    }
    if outcome.saved_binary || outcome.saved_dependency {
        ui::stage(
            ctx,
            InstallStage::CacheSave,
            Mark::Ok,
            &format!(
                "binary={} dependencies={}",
                outcome.saved_binary, outcome.saved_dependency
            ),
        );
    }
}
