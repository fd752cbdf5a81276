//! Database schema for teledeck.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const SOURCE_FK: ForeignKey = ForeignKey {
    foreign_table: "sources",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Restrict,
};

const MEDIA_TYPE_FK: ForeignKey = ForeignKey {
    foreign_table: "media_types",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Restrict,
};

const MEDIA_ITEM_FK: ForeignKey = ForeignKey {
    foreign_table: "media_items",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const TAG_FK: ForeignKey = ForeignKey {
    foreign_table: "tags",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const SOURCES_TABLE_V0: Table = Table {
    name: "sources",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const MEDIA_TYPES_TABLE_V0: Table = Table {
    name: "media_types",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("type", &SqlType::Text, non_null = true, is_unique = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const CHANNELS_TABLE_V0: Table = Table {
    name: "channels",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!(
            "check",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const MEDIA_ITEMS_TABLE_V0: Table = Table {
    name: "media_items",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "source_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SOURCE_FK)
        ),
        sqlite_column!(
            "media_type_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&MEDIA_TYPE_FK)
        ),
        sqlite_column!("file_name", &SqlType::Text, non_null = true),
        sqlite_column!("file_size", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "seen",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "favorite",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "user_deleted",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("deleted_at", &SqlType::Integer),
    ],
    indices: &[
        ("idx_media_items_created_at", "created_at"),
        ("idx_media_items_file_size", "file_size"),
        ("idx_media_items_favorite", "favorite"),
        ("idx_media_items_user_deleted", "user_deleted"),
        ("idx_media_items_seen", "seen"),
        ("idx_media_items_file_name", "file_name"),
    ],
    unique_constraints: &[],
};

/// Platform-specific metadata, one row per media item.
const TELEGRAM_METADATA_TABLE_V0: Table = Table {
    name: "telegram_metadata",
    columns: &[
        sqlite_column!(
            "media_item_id",
            &SqlType::Text,
            is_primary_key = true,
            foreign_key = Some(&MEDIA_ITEM_FK)
        ),
        sqlite_column!("channel_id", &SqlType::Integer),
        sqlite_column!("message_id", &SqlType::Integer),
        sqlite_column!("file_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "from_preview",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("date", &SqlType::Integer),
        sqlite_column!("text", &SqlType::Text),
        sqlite_column!("url", &SqlType::Text),
    ],
    indices: &[
        ("idx_tg_metadata_watermark", "channel_id, message_id"),
    ],
    unique_constraints: &[&["file_id", "from_preview"]],
};

const TAGS_TABLE_V0: Table = Table {
    name: "tags",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const MEDIA_ITEM_TAGS_TABLE_V0: Table = Table {
    name: "media_item_tags",
    columns: &[
        sqlite_column!(
            "media_item_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&MEDIA_ITEM_FK)
        ),
        sqlite_column!(
            "tag_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&TAG_FK)
        ),
        sqlite_column!("weight", &SqlType::Real, non_null = true),
    ],
    indices: &[
        ("idx_media_item_tags_tag", "tag_id"),
        ("idx_media_item_tags_weight", "weight"),
    ],
    unique_constraints: &[&["media_item_id", "tag_id"]],
};

/// Written by offline duplicate detection only.
const MEDIA_ITEM_DUPLICATES_TABLE_V0: Table = Table {
    name: "media_item_duplicates",
    columns: &[
        sqlite_column!(
            "first_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&MEDIA_ITEM_FK)
        ),
        sqlite_column!(
            "second_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&MEDIA_ITEM_FK)
        ),
    ],
    indices: &[],
    unique_constraints: &[&["first_id", "second_id"]],
};

pub const TELEDECK_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        SOURCES_TABLE_V0,
        MEDIA_TYPES_TABLE_V0,
        CHANNELS_TABLE_V0,
        MEDIA_ITEMS_TABLE_V0,
        TELEGRAM_METADATA_TABLE_V0,
        TAGS_TABLE_V0,
        MEDIA_ITEM_TAGS_TABLE_V0,
        MEDIA_ITEM_DUPLICATES_TABLE_V0,
    ],
    migration: None,
}];
