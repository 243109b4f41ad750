//! Cache command - inspect and prune the local cache store

use super::local_cache;
use crate::cache::{format_bytes, EntryManifest, LocalCache};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::SetupResult;
use crate::ui::{self, Mark, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> SetupResult<()> {
    let store = local_cache(args.dir, config);

    match args.action {
        CacheAction::List { format } => list_entries(&store, format),
        CacheAction::Gc { days, dry_run } => {
            gc_entries(&store, days.unwrap_or(config.cache.max_age_days), dry_run)
        }
        CacheAction::Clear => clear_entries(&store),
    }
}

fn list_entries(store: &LocalCache, format: OutputFormat) -> SetupResult<()> {
    let entries = store.entries()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text if entries.is_empty() => {
            let ctx = UiContext::detect();
            ui::step(&ctx, Mark::Info, &format!("No cache entries in {}", store.root().display()));
        }
        OutputFormat::Text => print_table(&entries),
    }
    Ok(())
}

fn print_table(entries: &[EntryManifest]) {
    println!(
        "{:<56} {:>10} {:<20}",
        style("KEY").bold(),
        style("SIZE").bold(),
        style("CREATED").bold()
    );
    println!("{}", "-".repeat(88));

    let mut total = 0;
    for entry in entries {
        total += entry.size_bytes;
        println!(
            "{:<56} {:>10} {:<20}",
            entry.key,
            format_bytes(entry.size_bytes),
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} entr(ies), {}", entries.len(), format_bytes(total));
}

/// Entries past the age cutoff; `0` days disables collection
fn expired(entries: Vec<EntryManifest>, days: u32) -> Vec<EntryManifest> {
    if days == 0 {
        return Vec::new();
    }
    entries
        .into_iter()
        .filter(|e| e.is_older_than_days(days))
        .collect()
}

fn gc_entries(store: &LocalCache, days: u32, dry_run: bool) -> SetupResult<()> {
    let ctx = UiContext::detect();
    let stale = expired(store.entries()?, days);

    if stale.is_empty() {
        ui::step(&ctx, Mark::Ok, &format!("No entries older than {} days", days));
        return Ok(());
    }

    let mut freed = 0;
    for entry in &stale {
        if dry_run {
            ui::note(&ctx, &format!("Would remove {}", entry.key));
        } else {
            store.remove(&entry.key)?;
        }
        freed += entry.size_bytes;
    }

    let verb = if dry_run { "Would free" } else { "Freed" };
    ui::step_detail(
        &ctx,
        Mark::Ok,
        &format!("{} {}", verb, format_bytes(freed)),
        &format!("{} entr(ies) older than {} days", stale.len(), days),
    );
    Ok(())
}

fn clear_entries(store: &LocalCache) -> SetupResult<()> {
    let ctx = UiContext::detect();
    let entries = store.entries()?;

    for entry in &entries {
        store.remove(&entry.key)?;
    }

    ui::step_detail(
        &ctx,
        Mark::Ok,
        &format!("Removed {} cache entr(ies)", entries.len()),
        &store.root().display().to_string(),
    );
    Ok(())
}
