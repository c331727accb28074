use branchlog_core::{CoreError, MessageId};
use branchlog_storage::StorageError;
use thiserror::Error;

use crate::generator::GeneratorError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("message {0} is an assistant reply and cannot be edited")]
    NotEditable(MessageId),

    #[error("response generation failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("invalid config: {0}")]
    Config(String),
}

impl EngineError {
    /// True when stored data violates the message-tree invariants.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_corruption())
    }
}
