//! Teledeck updater library
//!
//! Crawls channels through the platform bridge, downloads their media into
//! the media root and records each item in the SQLite media database.

pub mod admin;
pub mod backoff;
pub mod channels;
pub mod config;
pub mod fetch;
pub mod media;
pub mod platform;
pub mod progress;
pub mod queue;
pub mod run_log;
pub mod sqlite_persistence;
pub mod store;
pub mod tagging;
pub mod updater;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use platform::{HttpPlatformClient, PlatformClient};
pub use store::{MediaStore, SqliteMediaStore};
pub use updater::{RunConfig, RunSummary, Updater, UpdaterError};
