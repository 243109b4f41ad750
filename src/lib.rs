//! leo-setup - install the Leo compiler from source in CI
//!
//! Builds a pinned Leo release with a locked dependency graph, caching
//! both the finished binary and cargo's build dependencies so repeat runs
//! are fast.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod outputs;
pub mod params;
pub mod tools;
pub mod ui;
pub mod verify;

#[cfg(test)]
mod testing;

pub use error::{SetupError, SetupResult};
