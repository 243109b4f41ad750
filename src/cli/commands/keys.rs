//! Keys command - print the cache keys for a parameter set

use super::raw_params;
use crate::cache::key::CacheKeySet;
use crate::cli::args::{KeysArgs, OutputFormat};
use crate::config::Config;
use crate::error::SetupResult;
use crate::params::InstallRequest;

/// Execute the keys command
pub async fn execute(args: KeysArgs, config: &Config) -> SetupResult<()> {
    let request = InstallRequest::from_raw(raw_params(&args.params, config))?;
    let keys = CacheKeySet::build(&request)?;

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&keys)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
    }
    Ok(())
}

fn render_text(keys: &CacheKeySet) -> String {
    let mut out = format!(
        "binary-key={}\ndependency-key={}\n",
        keys.binary_key, keys.dependency_key
    );
    for key in &keys.dependency_restore_keys {
        out.push_str(&format!("dependency-restore-key={}\n", key));
    }
    out
}
