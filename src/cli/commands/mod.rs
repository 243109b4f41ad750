//! CLI command implementations

pub mod cache;
pub mod config;
pub mod install;
pub mod keys;
pub mod verify;

pub use cache::execute as cache;
pub use config::execute as config;
pub use install::execute as install;
pub use keys::execute as keys;
pub use verify::execute as verify;

use crate::cache::store::LocalCache;
use crate::cli::args::ParamArgs;
use crate::config::Config;
use crate::params::{Arch, Os, RawParams};
use std::path::PathBuf;

/// Raw parameters from CLI flags layered over config, then host defaults
fn raw_params(params: &ParamArgs, config: &Config) -> RawParams {
    let mut raw = RawParams::for_version(params.version.clone());
    raw.toolchain_version = params
        .toolchain
        .clone()
        .unwrap_or_else(|| config.install.toolchain_version.clone());
    raw.os = params.os.clone().unwrap_or_else(|| Os::host().to_string());
    raw.arch = params.arch.clone().unwrap_or_else(|| Arch::host().to_string());
    raw.repo_url = config.install.repo_url.clone();
    raw.cache_enabled = config.cache.enabled;
    raw.cache_save_policy = config.cache.save_policy.clone();
    raw.run_audit = config.audit.enabled;
    raw.audit_deny_warnings = config.audit.deny_warnings;
    raw
}

/// Local cache store rooted at the flag, the config, or the default
fn local_cache(dir: Option<PathBuf>, config: &Config) -> LocalCache {
    LocalCache::new(
        dir.or_else(|| config.cache.dir.clone())
            .unwrap_or_else(LocalCache::default_root),
    )
}
