//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{SetupError, SetupResult};
use crate::ui::{self, Mark, UiContext};
use std::path::PathBuf;

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    config_path: Option<PathBuf>,
) -> SetupResult<()> {
    let manager = config_path
        .map(ConfigManager::with_path)
        .unwrap_or_default();

    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(&manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(&manager, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> SetupResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> SetupResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_detail(
            &ctx,
            Mark::Warn,
            &format!("Config already exists at {}", path.display()),
            "use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;

    ui::step_detail(
        &ctx,
        Mark::Ok,
        "Configuration initialized",
        &path.display().to_string(),
    );

    Ok(())
}

async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> SetupResult<()> {
    let ctx = UiContext::detect();

    if !ConfigManager::known_keys().any(|k| k == key) {
        ui::step_detail(&ctx, Mark::Fail, "Unknown config key", key);
        ui::note(&ctx, "Valid keys:");
        for key in ConfigManager::known_keys() {
            eprintln!("  {}", key);
        }
        return Err(SetupError::User(format!("Unknown config key: {}", key)));
    }

    manager.set_value(key, value).await?;
    ui::step(&ctx, Mark::Ok, &format!("Set {} = {}", key, value));

    Ok(())
}
