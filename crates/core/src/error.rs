use thiserror::Error;

use crate::ids::MessageId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("cycle detected at message {message_id}")]
    CycleDetected { message_id: MessageId },

    #[error("message {message_id} references missing parent {parent_id}")]
    MissingParent {
        message_id: MessageId,
        parent_id: MessageId,
    },

    #[error("message {message_id} was created before its parent {parent_id}")]
    ForwardReference {
        message_id: MessageId,
        parent_id: MessageId,
    },

    #[error("message {message_id} was edited from missing message {edited_from}")]
    MissingEditSource {
        message_id: MessageId,
        edited_from: MessageId,
    },

    #[error("message {message_id} has {} concurrent edits: {successors:?}", successors.len())]
    EditChainBranched {
        message_id: MessageId,
        successors: Vec<MessageId>,
    },

    #[error("edit chain through message {message_id} exceeds {limit} versions")]
    EditChainTooLong { message_id: MessageId, limit: usize },
}

impl CoreError {
    /// Corruption errors mean the stored graph violates its invariants and the
    /// current operation must fail rather than return a truncated result.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, Self::InvalidMessage(_))
    }

    /// The message id the error points at, if any.
    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            Self::InvalidMessage(_) => None,
            Self::CycleDetected { message_id }
            | Self::MissingParent { message_id, .. }
            | Self::ForwardReference { message_id, .. }
            | Self::MissingEditSource { message_id, .. }
            | Self::EditChainBranched { message_id, .. }
            | Self::EditChainTooLong { message_id, .. } => Some(*message_id),
        }
    }
}
