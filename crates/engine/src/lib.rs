pub mod config;
pub mod error;
pub mod generator;

pub use config::EngineConfig;
pub use error::EngineError;
pub use generator::{GeneratorError, ResponseGenerator};

use std::collections::{BTreeMap, HashMap, HashSet};

use branchlog_core::{
    BranchNavigator, BranchPosition, ConversationId, CoreError, EditIndex, Message, MessageGroups,
    MessageId, NavOutcome, NewMessage, Path, branch_positions, enumerate_paths,
};
use branchlog_storage::{MessageStore, SqliteStorage};

/// A user message and the assistant reply generated for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: Message,
    pub reply: Message,
}

impl Exchange {
    pub fn ids(&self) -> [MessageId; 2] {
        [self.user.id, self.reply.id]
    }
}

/// Conversation-level operations over a message store.
///
/// Reads are pure computations over a snapshot of one conversation. Writes go
/// through `MessageStore::append_message`, which applies an edit and its
/// predecessor flag as one transaction.
pub struct Engine<S = SqliteStorage> {
    storage: S,
    generator: Box<dyn ResponseGenerator>,
    config: EngineConfig,
}

impl Engine<SqliteStorage> {
    /// Open the store described by `config` (in memory when no path is set).
    pub fn open(
        config: EngineConfig,
        generator: Box<dyn ResponseGenerator>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let storage = match &config.database_path {
            Some(path) => {
                let path = path.to_str().ok_or_else(|| {
                    EngineError::Config(format!("non-utf8 database path: {}", path.display()))
                })?;
                SqliteStorage::open(path)?
            }
            None => SqliteStorage::open_in_memory()?,
        };
        Ok(Self::new(storage, generator, config))
    }
}

impl<S: MessageStore> Engine<S> {
    pub fn new(storage: S, generator: Box<dyn ResponseGenerator>, config: EngineConfig) -> Self {
        Self {
            storage,
            generator,
            config,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn new_conversation(&self) -> ConversationId {
        ConversationId::new()
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>, EngineError> {
        Ok(self.storage.get_message(id)?)
    }

    pub fn get_messages_by_ids(&self, ids: &[MessageId]) -> Result<Vec<Message>, EngineError> {
        Ok(self.storage.get_messages_by_ids(ids)?)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn enumerate_paths(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Path>, EngineError> {
        let messages = self.storage.get_conversation_messages(conversation_id)?;
        Ok(enumerate_paths(conversation_id, &messages)?)
    }

    /// Per-path groups of newly introduced ids for a conversation.
    pub fn message_groups(
        &self,
        conversation_id: ConversationId,
    ) -> Result<MessageGroups, EngineError> {
        let paths = self.enumerate_paths(conversation_id)?;
        Ok(MessageGroups::from_paths(&paths))
    }

    pub fn resolve_edit_chain(&self, message_id: MessageId) -> Result<Vec<MessageId>, EngineError> {
        let Some(messages) = self.chain_scope(message_id)? else {
            return Ok(Vec::new());
        };
        Ok(self.edit_index(&messages).resolve_edit_chain(message_id)?)
    }

    pub fn latest_in_chain(&self, message_id: MessageId) -> Result<Option<MessageId>, EngineError> {
        let Some(messages) = self.chain_scope(message_id)? else {
            return Ok(None);
        };
        Ok(self.edit_index(&messages).latest_in_chain(message_id)?)
    }

    pub fn original_in_chain(
        &self,
        message_id: MessageId,
    ) -> Result<Option<MessageId>, EngineError> {
        let Some(messages) = self.chain_scope(message_id)? else {
            return Ok(None);
        };
        Ok(self.edit_index(&messages).original_in_chain(message_id)?)
    }

    pub fn branch_positions(
        &self,
        conversation_id: ConversationId,
        current_path: &[MessageId],
    ) -> Result<BTreeMap<MessageId, BranchPosition>, EngineError> {
        let paths = self.enumerate_paths(conversation_id)?;
        Ok(branch_positions(&paths, current_path))
    }

    /// Re-enumerate and hand the result to `navigator`, which discards it if
    /// the displayed branch has disappeared.
    pub fn refresh_navigator(
        &self,
        navigator: &mut BranchNavigator,
        conversation_id: ConversationId,
    ) -> Result<NavOutcome, EngineError> {
        let paths = self.enumerate_paths(conversation_id)?;
        Ok(navigator.accept_paths(paths))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Append a user message under `parent` (a new root when `None`) and the
    /// generated assistant reply beneath it.
    pub fn send_message(
        &mut self,
        conversation_id: ConversationId,
        parent: Option<MessageId>,
        content: &str,
    ) -> Result<Exchange, EngineError> {
        let user = self
            .storage
            .append_message(&NewMessage::user(conversation_id, parent, content))?;
        let reply = self.reply_to(&user)?;
        Ok(Exchange { user, reply })
    }

    /// Branch a new version of a user message and generate a reply for it.
    ///
    /// If the message has already been edited, the new version extends the
    /// chain from its latest version. The original stays in place.
    pub fn edit_message(
        &mut self,
        message_id: MessageId,
        content: &str,
    ) -> Result<Exchange, EngineError> {
        let target = self
            .storage
            .get_message(message_id)?
            .ok_or(EngineError::MessageNotFound(message_id))?;
        if !target.is_user() {
            return Err(EngineError::NotEditable(message_id));
        }

        let latest = if target.is_edited {
            let messages = self
                .storage
                .get_conversation_messages(target.conversation_id)?;
            let index = self.edit_index(&messages);
            let latest_id = index.latest_in_chain(message_id)?.unwrap_or(message_id);
            index.get(latest_id).cloned().unwrap_or(target)
        } else {
            target
        };

        let request = NewMessage::user(latest.conversation_id, latest.parent_message_id, content)
            .edit_of(latest.id);
        let user = self.storage.append_message(&request)?;
        tracing::info!(
            edited = %latest.id,
            new_version = %user.id,
            conversation_id = %user.conversation_id,
            "created edit branch"
        );
        let reply = self.reply_to(&user)?;
        Ok(Exchange { user, reply })
    }

    fn reply_to(&mut self, user: &Message) -> Result<Message, EngineError> {
        let context = self.context_for(user)?;
        let text = self.generator.generate(&context).inspect_err(|e| {
            tracing::warn!(message_id = %user.id, error = %e, "reply generation failed");
        })?;
        let reply = self
            .storage
            .append_message(&NewMessage::assistant(user.conversation_id, user.id, text))?;
        Ok(reply)
    }

    /// The last `context_window` messages of the path ending at `leaf`.
    fn context_for(&self, leaf: &Message) -> Result<Vec<Message>, EngineError> {
        let messages = self.storage.get_conversation_messages(leaf.conversation_id)?;
        let by_id: HashMap<MessageId, &Message> = messages.iter().map(|m| (m.id, m)).collect();

        let mut lineage = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(leaf.id);
        while let Some(id) = cursor {
            if lineage.len() >= self.config.context_window {
                break;
            }
            if !seen.insert(id) {
                return Err(CoreError::CycleDetected { message_id: id }.into());
            }
            let message = by_id.get(&id).ok_or(EngineError::MessageNotFound(id))?;
            lineage.push((*message).clone());
            cursor = message.parent_message_id;
        }
        lineage.reverse();
        Ok(lineage)
    }

    /// All messages of the conversation holding `message_id`, or `None` when
    /// the message does not exist.
    fn chain_scope(&self, message_id: MessageId) -> Result<Option<Vec<Message>>, EngineError> {
        let Some(message) = self.storage.get_message(message_id)? else {
            tracing::debug!(message_id = %message_id, "edit chain requested for unknown message");
            return Ok(None);
        };
        Ok(Some(
            self.storage
                .get_conversation_messages(message.conversation_id)?,
        ))
    }

    fn edit_index<'a>(&self, messages: &'a [Message]) -> EditIndex<'a> {
        EditIndex::new(messages).with_max_chain_length(self.config.max_chain_length)
    }
}
