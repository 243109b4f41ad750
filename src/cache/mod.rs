//! Two-tier build cache
//!
//! A run first looks for a previously built `leo` binary. On a miss it
//! falls back to restoring cargo's registry and target directory so the
//! rebuild is incremental.
//!
//! # Tiers
//!
//! | Tier | Restored on | Restore keys |
//! |------|-------------|--------------|
//! | binary | every run | exact key only |
//! | dependency | binary miss | exact, then prefix fallbacks |
//!
//! Cache failures never fail a run: a restore error is a miss and a save
//! error is a skipped save.

pub mod key;
pub mod orchestrator;
pub mod store;

pub use key::{CacheKey, CacheKeySet};
pub use orchestrator::{CacheOrchestrator, CacheOutcome, Collaborators, RunFailure};
pub use store::{format_bytes, ArtifactCache, EntryManifest, LocalCache, RestoreResult};
