//! Common test infrastructure
//!
//! End-to-end tests drive the real pipeline against a fake platform bridge
//! served over HTTP. Tests should only import from this module, not from
//! internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{document_message, TestPipeline, CHANNEL_ID};
//!
//! #[tokio::test]
//! async fn test_unread_run() {
//!     let pipeline = TestPipeline::spawn().await;
//!     pipeline.bridge.add_message(document_message(CHANNEL_ID, 1, "f1", 10, "video/mp4"));
//!     pipeline.bridge.set_unread(CHANNEL_ID, 1);
//!
//!     let summary = pipeline.update("unread").await.unwrap();
//!     assert_eq!(summary.processed, 1);
//! }
//! ```

#![allow(dead_code)]

mod bridge;
mod constants;
mod fixtures;

// Public API - this is what tests import
pub use bridge::FakeBridge;
pub use constants::*;
pub use fixtures::*;
