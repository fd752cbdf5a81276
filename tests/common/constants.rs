//! Shared constants for end-to-end tests

/// Channel every scenario crawls unless it sets up its own.
pub const CHANNEL_ID: i64 = 1001;
pub const CHANNEL_TITLE: &str = "Test";

/// A second channel used by folder and forward scenarios.
pub const OTHER_CHANNEL_ID: i64 = 1002;
pub const OTHER_CHANNEL_TITLE: &str = "Other";

pub const FOLDER_NAME: &str = "MediaView";

/// Timeout for HTTP calls against the fake bridge.
pub const BRIDGE_TIMEOUT_SECS: u64 = 5;

/// Poll interval while waiting for the bridge to come up.
pub const BRIDGE_READY_POLL_INTERVAL_MS: u64 = 10;

/// Maximum time to wait for the bridge to answer.
pub const BRIDGE_READY_TIMEOUT_MS: u64 = 5000;
