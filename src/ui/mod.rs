//! UI module for consistent CLI output
//!
//! Uses `cliclack` and `indicatif` when attached to a terminal, with
//! automatic fallback to plain lines in CI logs.
//!
//! # Example
//!
//! ```rust,ignore
//! use leo_setup::ui::{self, Mark, TaskSpinner, UiContext};
//!
//! let ctx = UiContext::detect();
//!
//! ui::banner(&ctx, "leo-setup install");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Restoring binary cache...");
//! // ... do work ...
//! spinner.stop("Binary cache hit");
//!
//! ui::finish(&ctx, Mark::Ok, "leo 3.4.0 installed");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{banner, fact, finish, note, probe, stage, step, step_detail, InstallStage, Mark};
pub use progress::{count_lock_packages, BuildProgress, TaskSpinner};
