use chrono::{DateTime, TimeZone, Utc};

use crate::ids::{ConversationId, MessageId};
use crate::message::Message;

/// Deterministic timestamp for message `id`: one second apart.
pub(crate) fn at(id: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + id, 0).single().unwrap_or_default()
}

/// Build a message with `id`, optional parent and optional edit source.
pub(crate) fn msg(
    conversation_id: ConversationId,
    id: i64,
    parent: Option<i64>,
    edited_from: Option<i64>,
) -> Message {
    Message {
        id: MessageId::new(id),
        conversation_id,
        content: format!("message {id}"),
        created_at: at(id),
        is_from_sender: id % 2 == 1,
        parent_message_id: parent.map(MessageId::new),
        edited_from_message_id: edited_from.map(MessageId::new),
        is_edited: false,
    }
}

/// Set `is_edited` on every message that some other message was edited from.
pub(crate) fn flag_edited(mut messages: Vec<Message>) -> Vec<Message> {
    let sources: Vec<MessageId> = messages
        .iter()
        .filter_map(|m| m.edited_from_message_id)
        .collect();
    for m in &mut messages {
        if sources.contains(&m.id) {
            m.is_edited = true;
        }
    }
    messages
}
