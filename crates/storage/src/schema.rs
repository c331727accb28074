use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id BLOB NOT NULL CHECK (length(conversation_id) = 16),
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    is_from_sender INTEGER NOT NULL CHECK (is_from_sender IN (0, 1)),
    parent_message_id INTEGER REFERENCES messages (id),
    edited_from_message_id INTEGER REFERENCES messages (id),
    is_edited INTEGER NOT NULL DEFAULT 0 CHECK (is_edited IN (0, 1))
);
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages (conversation_id, id);
CREATE INDEX IF NOT EXISTS idx_messages_parent ON messages (parent_message_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_edited_from ON messages (edited_from_message_id)
    WHERE edited_from_message_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS cursors (
    conversation_id BLOB PRIMARY KEY CHECK (length(conversation_id) = 16),
    path BLOB NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
";
