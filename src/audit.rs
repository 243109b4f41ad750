//! Run history
//!
//! Each install or verify run appends one JSON line to
//! `~/.local/state/leo-setup/audit.log`:
//!
//! ```text
//! {"timestamp":"...","run_id":"...","event":"install.completed","data":{"request":{...},"outcome":{...},"error":null}}
//! ```
//!
//! Disabled with `general.audit_log = false`.

use crate::cache::CacheOutcome;
use crate::config::{schema::Config, ConfigManager};
use crate::error::SetupError;
use crate::params::InstallRequest;
use crate::verify::VerificationReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// What a run recorded
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RunEvent<'a> {
    Install {
        request: &'a InstallRequest,
        outcome: &'a CacheOutcome,
        error: Option<String>,
    },
    Verify {
        report: &'a VerificationReport,
        error: Option<String>,
    },
}

impl<'a> RunEvent<'a> {
    pub fn install(
        request: &'a InstallRequest,
        outcome: &'a CacheOutcome,
        error: Option<&SetupError>,
    ) -> Self {
        Self::Install {
            request,
            outcome,
            error: error.map(ToString::to_string),
        }
    }

    pub fn verify(report: &'a VerificationReport, error: Option<&SetupError>) -> Self {
        Self::Verify {
            report,
            error: error.map(ToString::to_string),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install.completed",
            Self::Verify { .. } => "verify.completed",
        }
    }
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: DateTime<Utc>,
    run_id: Uuid,
    event: &'static str,
    data: &'a RunEvent<'a>,
}

/// Appends run events to the history file
pub struct RunHistory {
    enabled: bool,
    path: PathBuf,
    run_id: Uuid,
}

impl RunHistory {
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append `event`. A history that cannot be written only warns.
    pub async fn record(&self, event: &RunEvent<'_>) {
        if !self.enabled {
            return;
        }

        let record = Record {
            timestamp: Utc::now(),
            run_id: self.run_id,
            event: event.name(),
            data: event,
        };
        let line = match serde_json::to_string(&record) {
            Ok(json) => json + "\n",
            Err(e) => {
                warn!("Could not encode {} event: {}", event.name(), e);
                return;
            }
        };

        if let Err(e) = self.append(&line).await {
            warn!("Could not write run history {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
