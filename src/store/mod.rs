//! Persistent store for channels, media items and their platform metadata.

mod media_store;
mod models;
mod schema;

pub use media_store::{MediaStore, SqliteMediaStore};
pub use models::*;
pub use schema::TELEDECK_VERSIONED_SCHEMAS;
