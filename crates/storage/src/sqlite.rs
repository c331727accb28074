use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use branchlog_core::{ConversationId, Message, MessageId, NewMessage};

use crate::error::StorageError;
use crate::traits::MessageStore;

const MESSAGE_COLUMNS: &str = "id, conversation_id, content, created_at, is_from_sender,
     parent_message_id, edited_from_message_id, is_edited";

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn read_message(row: &rusqlite::Row) -> Result<Message, StorageError> {
    let id: i64 = row.get(0)?;
    let conversation_bytes: Vec<u8> = row.get(1)?;
    let content: String = row.get(2)?;
    let created_at_ms: i64 = row.get(3)?;
    let is_from_sender: bool = row.get(4)?;
    let parent_message_id: Option<i64> = row.get(5)?;
    let edited_from_message_id: Option<i64> = row.get(6)?;
    let is_edited: bool = row.get(7)?;

    let conversation_id =
        ConversationId::from_bytes(to_array::<16>(conversation_bytes, "conversation_id")?);
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_at_ms).ok_or_else(|| {
        StorageError::Serialization(format!("message {id}: created_at out of range"))
    })?;

    Ok(Message {
        id: MessageId::new(id),
        conversation_id,
        content,
        created_at,
        is_from_sender,
        parent_message_id: parent_message_id.map(MessageId::new),
        edited_from_message_id: edited_from_message_id.map(MessageId::new),
        is_edited,
    })
}

/// Map a StorageError into rusqlite's error type inside query_map closures.
fn tunnel(e: StorageError) -> rusqlite::Error {
    match e {
        StorageError::Sqlite(sq) => sq,
        other => rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Blob,
            Box::new(OpaqueStorageError(other.to_string())),
        ),
    }
}

fn query_messages<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Message>, StorageError> {
    let mut stmt = conn.prepare(sql)?;
    let messages = stmt
        .query_map(params, |row| read_message(row).map_err(tunnel))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

/// Conversation, creation time and parent of an existing message.
struct Anchor {
    conversation_id: ConversationId,
    created_at_ms: i64,
    parent_message_id: Option<i64>,
    is_edited: bool,
}

fn load_anchor(
    tx: &rusqlite::Transaction,
    id: MessageId,
) -> Result<Option<Anchor>, StorageError> {
    let row = tx
        .query_row(
            "SELECT conversation_id, created_at, parent_message_id, is_edited
             FROM messages WHERE id = ?1",
            rusqlite::params![id.get()],
            |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, bool>(3)?,
                ))
            },
        )
        .optional()?;
    match row {
        None => Ok(None),
        Some((conversation_bytes, created_at_ms, parent_message_id, is_edited)) => Ok(Some(Anchor {
            conversation_id: ConversationId::from_bytes(to_array::<16>(
                conversation_bytes,
                "conversation_id",
            )?),
            created_at_ms,
            parent_message_id,
            is_edited,
        })),
    }
}

impl MessageStore for SqliteStorage {
    fn get_message(&self, id: MessageId) -> Result<Option<Message>, StorageError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
        let mut messages = query_messages(&self.conn, &sql, rusqlite::params![id.get()])?;
        Ok(messages.pop())
    }

    fn get_messages_by_ids(&self, ids: &[MessageId]) -> Result<Vec<Message>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id IN ({placeholders}) ORDER BY id"
        );
        query_messages(
            &self.conn,
            &sql,
            rusqlite::params_from_iter(ids.iter().map(|id| id.get())),
        )
    }

    fn get_conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StorageError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1 ORDER BY id"
        );
        query_messages(
            &self.conn,
            &sql,
            rusqlite::params![conversation_id.as_bytes().as_slice()],
        )
    }

    fn append_message(&mut self, message: &NewMessage) -> Result<Message, StorageError> {
        let tx = self.conn.transaction()?;

        let mut created_at_ms = Utc::now().timestamp_millis();

        if let Some(parent_id) = message.parent_message_id {
            let parent = load_anchor(&tx, parent_id)?
                .ok_or_else(|| StorageError::NotFound(format!("parent message {parent_id}")))?;
            if parent.conversation_id != message.conversation_id {
                return Err(StorageError::ConstraintViolation(format!(
                    "parent message {parent_id} belongs to another conversation"
                )));
            }
            // Children never predate their parent, even if the wall clock stepped back.
            created_at_ms = created_at_ms.max(parent.created_at_ms);
        }

        if let Some(source_id) = message.edited_from_message_id {
            let source = load_anchor(&tx, source_id)?
                .ok_or_else(|| StorageError::NotFound(format!("edited message {source_id}")))?;
            if source.conversation_id != message.conversation_id {
                return Err(StorageError::ConstraintViolation(format!(
                    "edited message {source_id} belongs to another conversation"
                )));
            }
            if source.parent_message_id != message.parent_message_id.map(|p| p.get()) {
                return Err(StorageError::ConstraintViolation(format!(
                    "edit of message {source_id} must share its parent"
                )));
            }
            if source.is_edited {
                return Err(StorageError::ConstraintViolation(format!(
                    "message {source_id} already has a newer version"
                )));
            }
            created_at_ms = created_at_ms.max(source.created_at_ms);
        }

        tx.execute(
            "INSERT INTO messages (conversation_id, content, created_at, is_from_sender,
                 parent_message_id, edited_from_message_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                message.conversation_id.as_bytes().as_slice(),
                message.content,
                created_at_ms,
                message.is_from_sender,
                message.parent_message_id.map(|p| p.get()),
                message.edited_from_message_id.map(|p| p.get()),
            ],
        )?;
        let id = MessageId::new(tx.last_insert_rowid());

        if let Some(source_id) = message.edited_from_message_id {
            tx.execute(
                "UPDATE messages SET is_edited = 1 WHERE id = ?1",
                rusqlite::params![source_id.get()],
            )?;
        }

        tx.commit()?;

        let created_at = DateTime::<Utc>::from_timestamp_millis(created_at_ms).ok_or_else(|| {
            StorageError::Serialization(format!("message {id}: created_at out of range"))
        })?;
        tracing::info!(
            message_id = %id,
            conversation_id = %message.conversation_id,
            edited_from = ?message.edited_from_message_id,
            "appended message"
        );

        Ok(Message {
            id,
            conversation_id: message.conversation_id,
            content: message.content.clone(),
            created_at,
            is_from_sender: message.is_from_sender,
            parent_message_id: message.parent_message_id,
            edited_from_message_id: message.edited_from_message_id,
            is_edited: false,
        })
    }

    fn set_edited(&mut self, id: MessageId) -> Result<(), StorageError> {
        let updated = self.conn.execute(
            "UPDATE messages SET is_edited = 1 WHERE id = ?1",
            rusqlite::params![id.get()],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("message {id}")));
        }
        Ok(())
    }

    fn save_cursor(
        &mut self,
        conversation_id: ConversationId,
        path: &[MessageId],
    ) -> Result<(), StorageError> {
        let blob =
            rmp_serde::to_vec(path).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO cursors (conversation_id, path) VALUES (?1, ?2)
             ON CONFLICT(conversation_id) DO UPDATE SET path = excluded.path,
                 updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
            rusqlite::params![conversation_id.as_bytes().as_slice(), blob],
        )?;
        Ok(())
    }

    fn load_cursor(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Vec<MessageId>>, StorageError> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT path FROM cursors WHERE conversation_id = ?1",
                rusqlite::params![conversation_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        blob.map(|bytes| {
            rmp_serde::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }
}

/// Wrapper error type used to tunnel StorageError through rusqlite's error system
/// in query_map closures that must return rusqlite::Error.
#[derive(Debug)]
struct OpaqueStorageError(String);

impl std::fmt::Display for OpaqueStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for OpaqueStorageError {}
