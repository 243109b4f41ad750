//! Cache key derivation
//!
//! Two tiers of keys are derived from an [`InstallRequest`]:
//!
//! | Tier | Format | Invalidated by |
//! |------|--------|----------------|
//! | binary | `leo-binary-v{version}-{os}-{arch}` | version, os, arch |
//! | dependency | `leo-cargo-v{version}-{toolchain}-{os}-{arch}` | all of the above plus toolchain |
//!
//! The binary does not depend on the toolchain once built, so a toolchain
//! bump only throws away the dependency cache.

use crate::error::{SetupError, SetupResult};
use crate::params::InstallRequest;
use serde::Serialize;
use std::fmt;

/// Longest key accepted by the cache service
pub const MAX_KEY_LEN: usize = 512;

const BINARY_PREFIX: &str = "leo-binary";
const DEPENDENCY_PREFIX: &str = "leo-cargo";

/// A single cache key, case-normalized and length-bounded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    fn new(raw: String) -> SetupResult<Self> {
        let key = raw.to_ascii_lowercase();
        if key.len() > MAX_KEY_LEN {
            return Err(SetupError::invalid(
                "cache-key",
                format!("{} characters exceeds the {} limit", key.len(), MAX_KEY_LEN),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `self` is a prefix of `other`
    pub fn is_prefix_of(&self, other: &str) -> bool {
        other.starts_with(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// All keys needed for one install run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheKeySet {
    pub binary_key: CacheKey,
    pub dependency_key: CacheKey,
    /// Fallback lookups, most specific first
    pub dependency_restore_keys: Vec<CacheKey>,
}

impl CacheKeySet {
    /// Derive the key set for a request
    pub fn build(req: &InstallRequest) -> SetupResult<Self> {
        let version = req.tool_version();
        let toolchain = req.toolchain_version();
        let os = req.os();
        let arch = req.arch();

        let binary_key = CacheKey::new(format!("{BINARY_PREFIX}-v{version}-{os}-{arch}"))?;
        let dependency_key =
            CacheKey::new(format!("{DEPENDENCY_PREFIX}-v{version}-{toolchain}-{os}-{arch}"))?;

        let dependency_restore_keys = vec![
            dependency_key.clone(),
            CacheKey::new(format!("{DEPENDENCY_PREFIX}-v{version}-{toolchain}-{os}-"))?,
            CacheKey::new(format!("{DEPENDENCY_PREFIX}-v{version}-"))?,
        ];

        Ok(Self {
            binary_key,
            dependency_key,
            dependency_restore_keys,
        })
    }

    /// Restore keys after the exact key, as passed to the cache service
    pub fn dependency_fallbacks(&self) -> &[CacheKey] {
        &self.dependency_restore_keys[1..]
    }
}
