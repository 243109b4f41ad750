//! Step lines and report rows
//!
//! Every line carries a [`Mark`]. With a terminal the mark picks the
//! cliclack log style; in CI logs it becomes a bracketed prefix such as
//! `[OK]` so the lines stay greppable.

use super::context::UiContext;
use console::{style, StyledObject};

/// Status of a step or report row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Mark {
    /// `Ok` for a passed check, `Warn` otherwise
    pub fn from_check(passed: bool) -> Self {
        if passed {
            Self::Ok
        } else {
            Self::Warn
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Warn => "[WARN]",
            Self::Fail => "[FAIL]",
            Self::Info => "[INFO]",
        }
    }

    fn paint<D>(self, text: D) -> StyledObject<D> {
        match self {
            Self::Ok => style(text).green(),
            Self::Warn => style(text).yellow(),
            Self::Fail => style(text).red(),
            Self::Info => style(text).cyan(),
        }
    }

    fn log(self, text: String) {
        let _ = match self {
            Self::Ok => cliclack::log::success(text),
            Self::Warn => cliclack::log::warning(text),
            Self::Fail => cliclack::log::error(text),
            Self::Info => cliclack::log::info(text),
        };
    }
}

/// Stages of an install run that get a line in the summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    BinaryRestore,
    DependencyRestore,
    Build,
    CacheSave,
}

impl InstallStage {
    fn label(self) -> &'static str {
        match self {
            Self::BinaryRestore => "binary cache",
            Self::DependencyRestore => "dependency cache",
            Self::Build => "build",
            Self::CacheSave => "cache save",
        }
    }
}

/// Title line for a command
pub fn banner(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        let _ = cliclack::intro(style(title).cyan().bold());
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

/// Closing line for a command
pub fn finish(ctx: &UiContext, mark: Mark, message: &str) {
    if ctx.use_fancy_output() {
        let _ = cliclack::outro(mark.paint(message).bold());
    } else {
        println!("{} {}", mark.paint(mark.tag()), message);
    }
}

pub fn step(ctx: &UiContext, mark: Mark, message: &str) {
    if ctx.use_fancy_output() {
        mark.log(message.to_string());
    } else {
        println!("  {} {}", mark.paint(mark.tag()), message);
    }
}

/// A step with a dimmed detail in parentheses
pub fn step_detail(ctx: &UiContext, mark: Mark, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        mark.log(format!("{} ({})", message, style(detail).dim()));
    } else {
        println!("  {} {} ({})", mark.paint(mark.tag()), message, detail);
    }
}

/// One line of an install run summary, e.g. `dependency cache: restored`
pub fn stage(ctx: &UiContext, stage: InstallStage, mark: Mark, summary: &str) {
    step(ctx, mark, &format!("{}: {}", stage.label(), summary));
}

/// Secondary text under a step
pub fn note(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        let _ = cliclack::log::remark(message);
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Informational `label: value` row of a verification report
pub fn fact(ctx: &UiContext, label: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(label).dim(), value);
    } else {
        println!("  {}: {}", label, value);
    }
}

/// Result row of a verification probe
pub fn probe(ctx: &UiContext, label: &str, value: &str, passed: bool) {
    let mark = Mark::from_check(passed);
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(label).dim(), mark.paint(value));
    } else {
        println!("  {} {}: {}", mark.tag(), label, value);
    }
}
