use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::error::CoreError;
use crate::ids::MessageId;
use crate::message::Message;

/// Upper bound on versions in one edit chain before the data is treated as corrupt.
pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 1024;

/// Lookup structure over the `edited_from_message_id` overlay of one conversation.
///
/// Chains are linear: a message with more than one direct successor is reported
/// as `EditChainBranched` rather than silently resolved to one of them.
pub struct EditIndex<'a> {
    by_id: HashMap<MessageId, &'a Message>,
    successors: HashMap<MessageId, Vec<MessageId>>,
    max_chain_length: usize,
}

impl<'a> EditIndex<'a> {
    pub fn new(messages: impl IntoIterator<Item = &'a Message>) -> Self {
        let mut by_id = HashMap::new();
        let mut successors: HashMap<MessageId, Vec<MessageId>> = HashMap::new();
        for m in messages {
            match by_id.entry(m.id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(m);
                }
            }
            if let Some(source) = m.edited_from_message_id {
                successors.entry(source).or_default().push(m.id);
            }
        }
        for list in successors.values_mut() {
            list.sort();
        }
        Self {
            by_id,
            successors,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }

    pub fn with_max_chain_length(mut self, limit: usize) -> Self {
        self.max_chain_length = limit.max(1);
        self
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: MessageId) -> Option<&'a Message> {
        self.by_id.get(&id).copied()
    }

    /// The message directly edited from `id`, if any.
    pub fn successor(&self, id: MessageId) -> Result<Option<MessageId>, CoreError> {
        match self.successors.get(&id).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([next]) => Ok(Some(*next)),
            Some(many) => {
                let err = CoreError::EditChainBranched {
                    message_id: id,
                    successors: many.to_vec(),
                };
                tracing::warn!(error = %err, "edit chain is not linear");
                Err(err)
            }
        }
    }

    /// The message `id` was edited from, if any.
    pub fn predecessor(&self, id: MessageId) -> Result<Option<MessageId>, CoreError> {
        let Some(source) = self.get(id).and_then(|m| m.edited_from_message_id) else {
            return Ok(None);
        };
        if !self.contains(source) {
            return Err(CoreError::MissingEditSource {
                message_id: id,
                edited_from: source,
            });
        }
        Ok(Some(source))
    }

    /// Newest version of the chain containing `id`. `None` when `id` is unknown.
    pub fn latest_in_chain(&self, id: MessageId) -> Result<Option<MessageId>, CoreError> {
        if !self.contains(id) {
            return Ok(None);
        }
        let mut walk = ChainWalk::new(id, self.max_chain_length);
        let mut current = id;
        while let Some(next) = self.successor(current)? {
            walk.step(next)?;
            current = next;
        }
        Ok(Some(current))
    }

    /// Oldest version of the chain containing `id`. `None` when `id` is unknown.
    pub fn original_in_chain(&self, id: MessageId) -> Result<Option<MessageId>, CoreError> {
        if !self.contains(id) {
            return Ok(None);
        }
        let mut walk = ChainWalk::new(id, self.max_chain_length);
        let mut current = id;
        while let Some(prev) = self.predecessor(current)? {
            walk.step(prev)?;
            current = prev;
        }
        Ok(Some(current))
    }

    /// All versions of the chain containing `id`, oldest to newest.
    /// Empty when `id` is unknown; a singleton for a never-edited message.
    pub fn resolve_edit_chain(&self, id: MessageId) -> Result<Vec<MessageId>, CoreError> {
        let Some(original) = self.original_in_chain(id)? else {
            return Ok(Vec::new());
        };
        let mut walk = ChainWalk::new(original, self.max_chain_length);
        let mut chain = vec![original];
        let mut current = original;
        while let Some(next) = self.successor(current)? {
            walk.step(next)?;
            chain.push(next);
            current = next;
        }
        Ok(chain)
    }
}

/// Cycle and length guard shared by the chain traversals.
struct ChainWalk {
    start: MessageId,
    seen: HashSet<MessageId>,
    limit: usize,
}

impl ChainWalk {
    fn new(start: MessageId, limit: usize) -> Self {
        Self {
            start,
            seen: HashSet::from([start]),
            limit,
        }
    }

    fn step(&mut self, next: MessageId) -> Result<(), CoreError> {
        if !self.seen.insert(next) {
            tracing::warn!(message_id = %next, "edit chain loops back on itself");
            return Err(CoreError::CycleDetected { message_id: next });
        }
        if self.seen.len() > self.limit {
            return Err(CoreError::EditChainTooLong {
                message_id: self.start,
                limit: self.limit,
            });
        }
        Ok(())
    }
}
