use branchlog_core::{BranchNavigator, ConversationId, Message, MessageId, NewMessage, path_ids};
use branchlog_engine::{Engine, EngineConfig, EngineError, Exchange, ResponseGenerator};
use branchlog_storage::MessageStore;

use crate::generators::EchoGenerator;

/// One conversation over a fresh in-memory engine.
pub struct TestConversation {
    pub engine: Engine,
    pub conversation_id: ConversationId,
}

impl TestConversation {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_generator(Box::new(EchoGenerator))
    }

    pub fn with_generator(generator: Box<dyn ResponseGenerator>) -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default(), generator)
    }

    pub fn with_config(
        config: EngineConfig,
        generator: Box<dyn ResponseGenerator>,
    ) -> Result<Self, EngineError> {
        crate::init_tracing();
        let engine = Engine::open(config, generator)?;
        let conversation_id = engine.new_conversation();
        Ok(Self {
            engine,
            conversation_id,
        })
    }

    /// Append a single message without generating a reply.
    pub fn append(
        &mut self,
        parent: Option<MessageId>,
        content: &str,
        from_user: bool,
    ) -> Result<Message, EngineError> {
        let request = NewMessage {
            conversation_id: self.conversation_id,
            content: content.to_string(),
            is_from_sender: from_user,
            parent_message_id: parent,
            edited_from_message_id: None,
        };
        Ok(self.engine.storage_mut().append_message(&request)?)
    }

    /// Append a new version of `original` in its position, without a reply.
    pub fn append_edit(
        &mut self,
        original: MessageId,
        content: &str,
    ) -> Result<Message, EngineError> {
        let source = self
            .engine
            .get_message(original)?
            .ok_or(EngineError::MessageNotFound(original))?;
        let request = NewMessage {
            conversation_id: self.conversation_id,
            content: content.to_string(),
            is_from_sender: source.is_from_sender,
            parent_message_id: source.parent_message_id,
            edited_from_message_id: Some(original),
        };
        Ok(self.engine.storage_mut().append_message(&request)?)
    }

    /// Build a linear chain of `len` alternating user/assistant messages.
    pub fn linear(&mut self, len: usize) -> Result<Vec<MessageId>, EngineError> {
        let mut ids = Vec::with_capacity(len);
        let mut parent = None;
        for i in 0..len {
            let message = self.append(parent, &format!("turn {i}"), i % 2 == 0)?;
            parent = Some(message.id);
            ids.push(message.id);
        }
        Ok(ids)
    }

    pub fn say(
        &mut self,
        parent: Option<MessageId>,
        content: &str,
    ) -> Result<Exchange, EngineError> {
        self.engine.send_message(self.conversation_id, parent, content)
    }

    pub fn edit(&mut self, message_id: MessageId, content: &str) -> Result<Exchange, EngineError> {
        self.engine.edit_message(message_id, content)
    }

    pub fn path_ids(&self) -> Result<Vec<Vec<MessageId>>, EngineError> {
        Ok(path_ids(&self.engine.enumerate_paths(self.conversation_id)?))
    }

    pub fn messages(&self) -> Result<Vec<Message>, EngineError> {
        Ok(self
            .engine
            .storage()
            .get_conversation_messages(self.conversation_id)?)
    }

    /// Navigator primed with the current enumeration, displaying the first path.
    pub fn navigator(&self) -> Result<BranchNavigator, EngineError> {
        let mut navigator = BranchNavigator::new();
        self.engine
            .refresh_navigator(&mut navigator, self.conversation_id)?;
        Ok(navigator)
    }
}
