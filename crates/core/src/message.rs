use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{ConversationId, MessageId};

/// A single chat message. Immutable once stored, apart from `is_edited`,
/// which flips to true exactly once when a successor edit is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_from_sender: bool,
    pub parent_message_id: Option<MessageId>,
    pub edited_from_message_id: Option<MessageId>,
    pub is_edited: bool,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.parent_message_id.is_none()
    }

    pub fn is_user(&self) -> bool {
        self.is_from_sender
    }

    /// True when this message replaces an earlier version.
    pub fn is_edit(&self) -> bool {
        self.edited_from_message_id.is_some()
    }

    /// Messages that sit in an edit chain get prev/next version controls.
    pub fn has_branch_controls(&self) -> bool {
        self.is_edited || self.is_edit()
    }
}

/// Append request handed to a message store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub content: String,
    pub is_from_sender: bool,
    pub parent_message_id: Option<MessageId>,
    pub edited_from_message_id: Option<MessageId>,
}

impl NewMessage {
    pub fn user(
        conversation_id: ConversationId,
        parent_message_id: Option<MessageId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            content: content.into(),
            is_from_sender: true,
            parent_message_id,
            edited_from_message_id: None,
        }
    }

    pub fn assistant(
        conversation_id: ConversationId,
        parent_message_id: MessageId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            content: content.into(),
            is_from_sender: false,
            parent_message_id: Some(parent_message_id),
            edited_from_message_id: None,
        }
    }

    pub fn edit_of(mut self, edited_from: MessageId) -> Self {
        self.edited_from_message_id = Some(edited_from);
        self
    }
}

/// Loosely typed message shape as it arrives from a transport boundary.
/// Convert with `Message::try_from` before handing it to any core operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    pub id: Option<i64>,
    pub conversation_id: Option<ConversationId>,
    pub content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_from_sender: Option<bool>,
    pub parent_message_id: Option<i64>,
    pub edited_from_message_id: Option<i64>,
    #[serde(default)]
    pub is_edited: Option<bool>,
}

fn positive_id(raw: i64, field: &str) -> Result<MessageId, CoreError> {
    if raw <= 0 {
        return Err(CoreError::InvalidMessage(format!(
            "{field} must be positive, got {raw}"
        )));
    }
    Ok(MessageId::new(raw))
}

impl TryFrom<RawMessage> for Message {
    type Error = CoreError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .ok_or_else(|| CoreError::InvalidMessage("missing id".into()))
            .and_then(|v| positive_id(v, "id"))?;
        let conversation_id = raw
            .conversation_id
            .ok_or_else(|| {
                CoreError::InvalidMessage(format!("message {id}: missing conversation_id"))
            })?;
        let content = raw
            .content
            .ok_or_else(|| CoreError::InvalidMessage(format!("message {id}: missing content")))?;
        let created_at = raw
            .created_at
            .ok_or_else(|| CoreError::InvalidMessage(format!("message {id}: missing created_at")))?;
        let parent_message_id = raw
            .parent_message_id
            .map(|v| positive_id(v, "parent_message_id"))
            .transpose()?;
        let edited_from_message_id = raw
            .edited_from_message_id
            .map(|v| positive_id(v, "edited_from_message_id"))
            .transpose()?;

        if parent_message_id == Some(id) {
            return Err(CoreError::InvalidMessage(format!(
                "message {id} is its own parent"
            )));
        }
        if edited_from_message_id == Some(id) {
            return Err(CoreError::InvalidMessage(format!(
                "message {id} is edited from itself"
            )));
        }

        Ok(Message {
            id,
            conversation_id,
            content,
            created_at,
            is_from_sender: raw.is_from_sender.unwrap_or(false),
            parent_message_id,
            edited_from_message_id,
            is_edited: raw.is_edited.unwrap_or(false),
        })
    }
}
