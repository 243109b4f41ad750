//! cargo-backed build tool

use crate::error::{SetupError, SetupResult};
use crate::tools::{build_error_output, stream_child_output, BuildOptions, BuildTool, OutputSink};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Builds with `cargo build`, pinned to one toolchain and target directory
#[derive(Debug, Clone)]
pub struct CargoBuild {
    toolchain: String,
    cargo_home: PathBuf,
    target_dir: PathBuf,
    binary_name: String,
}

impl CargoBuild {
    /// The target directory is kept outside the checkout so a restored
    /// dependency cache survives a fresh clone.
    pub fn new(
        toolchain: impl Into<String>,
        cargo_home: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        binary_name: impl Into<String>,
    ) -> Self {
        Self {
            toolchain: toolchain.into(),
            cargo_home: cargo_home.into(),
            target_dir: target_dir.into(),
            binary_name: binary_name.into(),
        }
    }

    /// Default `CARGO_HOME` when none is configured
    pub fn default_cargo_home() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cargo")
    }

    fn build_args(options: BuildOptions) -> Vec<&'static str> {
        let mut args = vec!["build"];
        if options.locked {
            args.push("--locked");
        }
        if options.release {
            args.push("--release");
        }
        args
    }

    fn artifact_path(&self, options: BuildOptions) -> PathBuf {
        let profile = if options.release { "release" } else { "debug" };
        self.target_dir.join(profile).join(&self.binary_name)
    }
}

#[async_trait]
impl BuildTool for CargoBuild {
    async fn build(
        &self,
        source_dir: &Path,
        options: BuildOptions,
        on_output: OutputSink<'_>,
    ) -> SetupResult<PathBuf> {
        let args = Self::build_args(options);
        debug!("Executing in {}: cargo {:?}", source_dir.display(), args);

        let mut child = Command::new("cargo")
            .args(&args)
            .current_dir(source_dir)
            .env("RUSTUP_TOOLCHAIN", &self.toolchain)
            .env("CARGO_HOME", &self.cargo_home)
            .env("CARGO_TARGET_DIR", &self.target_dir)
            .env("CARGO_TERM_COLOR", "never")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SetupError::command_failed(format!("cargo {:?}", args), e))?;

        let lines = stream_child_output(&mut child, on_output).await;
        let status = child
            .wait()
            .await
            .map_err(|e| SetupError::command_failed(format!("cargo {:?}", args), e))?;

        if !status.success() {
            return Err(SetupError::BuildFailed {
                output: build_error_output(&lines),
            });
        }

        let artifact = self.artifact_path(options);
        if !artifact.is_file() {
            return Err(SetupError::BuildFailed {
                output: format!("build succeeded but {} was not produced", artifact.display()),
            });
        }

        info!("Built {}", artifact.display());
        Ok(artifact)
    }

    fn dependency_paths(&self) -> Vec<PathBuf> {
        vec![
            self.cargo_home.join("registry").join("index"),
            self.cargo_home.join("registry").join("cache"),
            self.cargo_home.join("git").join("db"),
            self.target_dir.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cargo() -> CargoBuild {
        CargoBuild::new("stable", "/home/ci/.cargo", "/work/target", "leo")
    }

    #[test]
    fn locked_release_args() {
        assert_eq!(
            CargoBuild::build_args(BuildOptions::default()),
            vec!["build", "--locked", "--release"]
        );
        let unlocked = BuildOptions {
            locked: false,
            release: false,
        };
        assert_eq!(CargoBuild::build_args(unlocked), vec!["build"]);
    }

    #[test]
    fn artifact_in_profile_dir() {
        assert_eq!(
            cargo().artifact_path(BuildOptions::default()),
            PathBuf::from("/work/target/release/leo")
        );
    }

    #[test]
    fn dependency_paths_cover_registry_and_target() {
        let paths = cargo().dependency_paths();
        assert!(paths.contains(&PathBuf::from("/home/ci/.cargo/registry/index")));
        assert!(paths.contains(&PathBuf::from("/work/target")));
    }
}
