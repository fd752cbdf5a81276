//! SQLite-backed storage for ingested media and crawl state.

use super::models::*;
use super::schema::TELEDECK_VERSIONED_SCHEMAS;
use crate::platform::ChannelInfo;
use crate::sqlite_persistence::open_versioned;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub trait MediaStore: Send + Sync {
    // === Watermarks ===

    /// Highest message id ingested from the channel.
    fn last_seen_message_id(&self, channel_id: i64) -> Result<Option<i64>>;

    /// Lowest message id ingested from the channel.
    fn earliest_seen_message_id(&self, channel_id: i64) -> Result<Option<i64>>;

    // === Media ===

    /// Dedup lookup on (file id, from_preview).
    fn find_existing(&self, file_id: &str, from_preview: bool) -> Result<Option<ExistingMedia>>;

    /// Fill in channel and message ids on a legacy metadata row.
    fn patch_linkage(&self, media_item_id: &str, channel_id: i64, message_id: i64)
        -> Result<()>;

    /// Inserts the media item and its metadata row in one transaction.
    /// Nothing is written when the (file id, from_preview) pair is already
    /// stored; the stored item is returned instead.
    fn insert_media(&self, record: &NewMediaRecord) -> Result<InsertOutcome>;

    fn get_media_item(&self, id: &str) -> Result<Option<MediaItem>>;

    fn get_metadata(&self, media_item_id: &str) -> Result<Option<TelegramMetadata>>;

    fn count_media_items(&self) -> Result<usize>;

    fn is_file_tracked(&self, file_name: &str) -> Result<bool>;

    // === Channels ===

    /// Returns true if the channel was inserted.
    fn add_channel_if_not_exists(&self, channel: &ChannelInfo) -> Result<bool>;

    fn checked_channels(&self) -> Result<Vec<Channel>>;

    fn list_channels(&self) -> Result<Vec<Channel>>;

    /// Clears every check flag, then checks exactly `channels`, inserting
    /// the ones not yet known.
    fn sync_checklist(&self, channels: &[ChannelInfo]) -> Result<()>;

    // === Tags ===

    fn untagged_still_images(&self, limit: usize) -> Result<Vec<MediaItem>>;

    fn save_tags(&self, media_item_id: &str, tags: &[(String, f64)]) -> Result<()>;

    fn tags_for(&self, media_item_id: &str) -> Result<Vec<(String, f64)>>;

    // === Duplicates ===

    /// Records an unordered duplicate pair. Returns false if already known.
    fn record_duplicate_pair(&self, first_id: &str, second_id: &str) -> Result<bool>;
}

pub struct SqliteMediaStore {
    conn: Arc<Mutex<Connection>>,
}

const MEDIA_ITEM_COLUMNS: &str = "m.id, s.name, t.type, m.file_name, m.file_size, \
     m.created_at, m.updated_at, m.seen, m.favorite, m.user_deleted, m.deleted_at";

const MEDIA_ITEM_JOINS: &str = "media_items m \
     JOIN sources s ON s.id = m.source_id \
     JOIN media_types t ON t.id = m.media_type_id";

impl SqliteMediaStore {
    /// Opens the database at `db_path`, creating and seeding it if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(
            db_path.as_ref(),
            TELEDECK_VERSIONED_SCHEMAS,
            "teledeck",
            seed_lookup_tables,
        )?;
        Ok(SqliteMediaStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        TELEDECK_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;
        seed_lookup_tables(&conn)?;
        Ok(SqliteMediaStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn row_to_media_item(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
        Ok(MediaItem {
            id: row.get(0)?,
            source: row.get(1)?,
            media_type: row.get(2)?,
            file_name: row.get(3)?,
            file_size: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            seen: row.get(7)?,
            favorite: row.get(8)?,
            user_deleted: row.get(9)?,
            deleted_at: row.get(10)?,
        })
    }

    fn row_to_channel(row: &rusqlite::Row) -> rusqlite::Result<Channel> {
        Ok(Channel {
            id: row.get("id")?,
            title: row.get("title")?,
            check: row.get("check")?,
        })
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

fn query_existing(
    conn: &Connection,
    file_id: &str,
    from_preview: bool,
) -> Result<Option<ExistingMedia>> {
    let existing = conn
        .query_row(
            r#"SELECT m.id, m.file_name, m.file_size, tm.channel_id, tm.message_id
               FROM telegram_metadata tm
               JOIN media_items m ON m.id = tm.media_item_id
               WHERE tm.file_id = ?1 AND tm.from_preview = ?2
               ORDER BY m.created_at ASC
               LIMIT 1"#,
            params![file_id, from_preview],
            |row| {
                Ok(ExistingMedia {
                    media_item_id: row.get(0)?,
                    file_name: row.get(1)?,
                    file_size: row.get(2)?,
                    channel_id: row.get(3)?,
                    message_id: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(existing)
}

fn seed_lookup_tables(conn: &Connection) -> Result<()> {
    for source in Source::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO sources (name) VALUES (?1)",
            [source.as_str()],
        )?;
    }
    for kind in MediaKind::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO media_types (type) VALUES (?1)",
            [kind.as_str()],
        )?;
    }
    Ok(())
}

impl MediaStore for SqliteMediaStore {
    fn last_seen_message_id(&self, channel_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let id = conn.query_row(
            "SELECT MAX(message_id) FROM telegram_metadata WHERE channel_id = ?1",
            [channel_id],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(id)
    }

    fn earliest_seen_message_id(&self, channel_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let id = conn.query_row(
            "SELECT MIN(message_id) FROM telegram_metadata WHERE channel_id = ?1",
            [channel_id],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(id)
    }

    fn find_existing(&self, file_id: &str, from_preview: bool) -> Result<Option<ExistingMedia>> {
        let conn = self.conn.lock().unwrap();
        query_existing(&conn, file_id, from_preview)
    }

    fn patch_linkage(
        &self,
        media_item_id: &str,
        channel_id: i64,
        message_id: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE telegram_metadata SET channel_id = ?1, message_id = ?2 WHERE media_item_id = ?3",
            params![channel_id, message_id, media_item_id],
        )?;
        if updated == 0 {
            bail!("No metadata row for media item {}", media_item_id);
        }
        conn.execute(
            "UPDATE media_items SET updated_at = ?1 WHERE id = ?2",
            params![Self::now(), media_item_id],
        )?;
        Ok(())
    }

    fn insert_media(&self, record: &NewMediaRecord) -> Result<InsertOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        if let Some(existing) = query_existing(&tx, &record.file_id, record.from_preview)? {
            return Ok(InsertOutcome::Existing(existing));
        }

        let source_id: i64 = tx
            .query_row(
                "SELECT id FROM sources WHERE name = ?1",
                [record.source.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .with_context(|| format!("Unknown source {}", record.source.as_str()))?;
        let media_type_id: i64 = tx
            .query_row(
                "SELECT id FROM media_types WHERE type = ?1",
                [record.media_type.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .with_context(|| format!("Unknown media type {}", record.media_type.as_str()))?;

        let id = Uuid::new_v4().simple().to_string();
        let now = Self::now();
        tx.execute(
            r#"INSERT INTO media_items (
                id, source_id, media_type_id, file_name, file_size, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
            params![
                id,
                source_id,
                media_type_id,
                record.file_name,
                record.file_size,
                now
            ],
        )?;
        tx.execute(
            r#"INSERT INTO telegram_metadata (
                media_item_id, channel_id, message_id, file_id, from_preview, date, text, url
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                id,
                record.channel_id,
                record.message_id,
                record.file_id,
                record.from_preview,
                record.date,
                record.text,
                format!("/media/{}", record.file_name),
            ],
        )?;
        tx.commit()?;
        Ok(InsertOutcome::Inserted(id))
    }

    fn get_media_item(&self, id: &str) -> Result<Option<MediaItem>> {
        let conn = self.conn.lock().unwrap();
        let item = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE m.id = ?1",
                    MEDIA_ITEM_COLUMNS, MEDIA_ITEM_JOINS
                ),
                [id],
                Self::row_to_media_item,
            )
            .optional()?;
        Ok(item)
    }

    fn get_metadata(&self, media_item_id: &str) -> Result<Option<TelegramMetadata>> {
        let conn = self.conn.lock().unwrap();
        let metadata = conn
            .query_row(
                r#"SELECT media_item_id, channel_id, message_id, file_id, from_preview,
                          date, text, url
                   FROM telegram_metadata WHERE media_item_id = ?1"#,
                [media_item_id],
                |row| {
                    Ok(TelegramMetadata {
                        media_item_id: row.get(0)?,
                        channel_id: row.get(1)?,
                        message_id: row.get(2)?,
                        file_id: row.get(3)?,
                        from_preview: row.get(4)?,
                        date: row.get(5)?,
                        text: row.get(6)?,
                        url: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(metadata)
    }

    fn count_media_items(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM media_items", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn is_file_tracked(&self, file_name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let tracked = conn
            .query_row(
                "SELECT 1 FROM media_items WHERE file_name = ?1 LIMIT 1",
                [file_name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(tracked)
    }

    fn add_channel_if_not_exists(&self, channel: &ChannelInfo) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO channels (id, title) VALUES (?1, ?2)",
            params![channel.id, channel.title],
        )?;
        Ok(inserted > 0)
    }

    fn checked_channels(&self) -> Result<Vec<Channel>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(r#"SELECT id, title, "check" FROM channels WHERE "check" = 1 ORDER BY id"#)?;
        let channels = stmt
            .query_map([], Self::row_to_channel)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(channels)
    }

    fn list_channels(&self) -> Result<Vec<Channel>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(r#"SELECT id, title, "check" FROM channels ORDER BY id"#)?;
        let channels = stmt
            .query_map([], Self::row_to_channel)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(channels)
    }

    fn sync_checklist(&self, channels: &[ChannelInfo]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(r#"UPDATE channels SET "check" = 0"#, [])?;
        for channel in channels {
            tx.execute(
                r#"INSERT INTO channels (id, title, "check") VALUES (?1, ?2, 1)
                   ON CONFLICT(id) DO UPDATE SET "check" = 1"#,
                params![channel.id, channel.title],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn untagged_still_images(&self, limit: usize) -> Result<Vec<MediaItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM {}
               WHERE t.type IN ('photo', 'image')
                 AND m.user_deleted = 0
                 AND NOT EXISTS (
                     SELECT 1 FROM media_item_tags mt WHERE mt.media_item_id = m.id
                 )
               ORDER BY m.created_at ASC
               LIMIT ?1"#,
            MEDIA_ITEM_COLUMNS, MEDIA_ITEM_JOINS
        ))?;
        let items = stmt
            .query_map([limit as i64], Self::row_to_media_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn save_tags(&self, media_item_id: &str, tags: &[(String, f64)]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (name, weight) in tags {
            tx.execute(
                "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                [name],
            )?;
            let tag_id: i64 =
                tx.query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))?;
            tx.execute(
                r#"INSERT INTO media_item_tags (media_item_id, tag_id, weight)
                   VALUES (?1, ?2, ?3)
                   ON CONFLICT(media_item_id, tag_id) DO UPDATE SET weight = excluded.weight"#,
                params![media_item_id, tag_id, weight],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn tags_for(&self, media_item_id: &str) -> Result<Vec<(String, f64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT t.name, mt.weight FROM media_item_tags mt
               JOIN tags t ON t.id = mt.tag_id
               WHERE mt.media_item_id = ?1
               ORDER BY mt.weight DESC"#,
        )?;
        let tags = stmt
            .query_map([media_item_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    fn record_duplicate_pair(&self, first_id: &str, second_id: &str) -> Result<bool> {
        if first_id == second_id {
            bail!("A media item cannot duplicate itself: {}", first_id);
        }
        let (a, b) = if first_id < second_id {
            (first_id, second_id)
        } else {
            (second_id, first_id)
        };
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO media_item_duplicates (first_id, second_id) VALUES (?1, ?2)",
            params![a, b],
        )?;
        Ok(inserted > 0)
    }
}
