use branchlog_core::{ConversationId, Message, MessageId, NewMessage};

use crate::error::StorageError;

/// Durable message records for the branching conversation model.
///
/// Writes are append-only. The only mutation of an existing record is the
/// `is_edited` flag, which is set in the same transaction that appends the
/// successor edit.
pub trait MessageStore {
    fn get_message(&self, id: MessageId) -> Result<Option<Message>, StorageError>;

    /// Messages for the ids that exist, ascending by id. Unknown ids are skipped.
    fn get_messages_by_ids(&self, ids: &[MessageId]) -> Result<Vec<Message>, StorageError>;

    /// Every message of a conversation, ascending by id.
    fn get_conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, StorageError>;

    /// Append a message. With `edited_from_message_id` set, the insert and the
    /// predecessor's `is_edited` flag are applied atomically.
    fn append_message(&mut self, message: &NewMessage) -> Result<Message, StorageError>;

    fn set_edited(&mut self, id: MessageId) -> Result<(), StorageError>;

    /// Remember the path a client last displayed for a conversation.
    fn save_cursor(
        &mut self,
        conversation_id: ConversationId,
        path: &[MessageId],
    ) -> Result<(), StorageError>;

    fn load_cursor(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<Vec<MessageId>>, StorageError>;
}
