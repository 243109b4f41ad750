//! rustup toolchain installer

use crate::error::{SetupError, SetupResult};
use crate::tools::ToolchainInstaller;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Installs toolchains with `rustup toolchain install`
#[derive(Debug, Clone, Default)]
pub struct Rustup;

impl Rustup {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolchainInstaller for Rustup {
    async fn ensure(&self, toolchain: &str) -> SetupResult<()> {
        let args = [
            "toolchain",
            "install",
            toolchain,
            "--profile",
            "minimal",
            "--no-self-update",
        ];
        debug!("Executing: rustup {:?}", args);

        let output = Command::new("rustup")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SetupError::ToolchainSetup {
                toolchain: toolchain.to_string(),
                reason: format!("could not run rustup: {}", e),
            })?;

        if !output.status.success() {
            return Err(SetupError::ToolchainSetup {
                toolchain: toolchain.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("Toolchain {} ready", toolchain);
        Ok(())
    }
}
