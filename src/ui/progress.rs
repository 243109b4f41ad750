//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }

    /// Clear the spinner without any message
    pub fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.clear();
        }
    }
}

/// Progress bar for `cargo build`.
///
/// Counts `Compiling <crate> v<version>` lines. When the lockfile package
/// count is known it is used as the bar length; cargo does not report a
/// total when its output is piped.
pub struct BuildProgress {
    bar: Option<ProgressBar>,
    compiled: AtomicU64,
    expected: Option<u64>,
}

impl BuildProgress {
    pub fn new(ctx: &UiContext, label: &str, expected: Option<u64>) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(expected.unwrap_or(0));
            let template = if expected.is_some() {
                "  {spinner:.cyan} Building {prefix}  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}"
            } else {
                "  {spinner:.cyan} Building {prefix}  {pos} crates {msg:.dim}  {elapsed:.dim}"
            };
            let style = ProgressStyle::default_bar()
                .template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                .progress_chars("━╸─");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Building {}...", label);
            None
        };
        Self {
            bar,
            compiled: AtomicU64::new(0),
            expected,
        }
    }

    /// Process one line of build output
    pub fn on_line(&self, line: String) {
        let Some(krate) = parse_compiling_line(&line) else {
            return;
        };
        let n = self.compiled.fetch_add(1, Ordering::Relaxed) + 1;

        match &self.bar {
            Some(bar) => {
                // Build scripts and the root crate can exceed the lockfile count
                if bar.length().is_some_and(|len| len > 0 && n > len) {
                    bar.set_length(n);
                }
                bar.set_position(n);
                bar.set_message(krate.to_string());
            }
            None => match self.expected {
                Some(total) => println!("  [{}/{}] Compiling {}", n, total, krate),
                None => println!("  [{}] Compiling {}", n, krate),
            },
        }
    }

    /// Number of crates compiled so far
    pub fn compiled(&self) -> u64 {
        self.compiled.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// Parse a cargo line like `   Compiling serde v1.0.219` into `serde v1.0.219`
fn parse_compiling_line(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("Compiling ")?;
    let name_end = rest.find(' ')?;
    let after = &rest[name_end + 1..];
    if !after.starts_with('v') {
        return None;
    }
    let version_len = after.find(' ').unwrap_or(after.len());
    Some(&rest[..name_end + 1 + version_len])
}

/// Number of `[[package]]` entries in a lockfile, if readable
pub fn count_lock_packages(lockfile: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(lockfile).ok()?;
    let count = content
        .lines()
        .filter(|l| l.trim() == "[[package]]")
        .count() as u64;
    (count > 0).then_some(count)
}
