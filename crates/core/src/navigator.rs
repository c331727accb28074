use std::collections::HashSet;

use crate::chain::{DEFAULT_MAX_CHAIN_LENGTH, EditIndex};
use crate::error::CoreError;
use crate::ids::MessageId;
use crate::message::Message;
use crate::paths::Path;

/// Length of the longest common prefix of `a` and `b`.
pub fn common_prefix_len(a: &[MessageId], b: &[MessageId]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Merge `target` onto `current`, keeping the shared prefix of `current` and
/// replacing only the divergent suffix.
pub fn select_path(current: &[MessageId], target: &[MessageId]) -> Vec<MessageId> {
    let k = common_prefix_len(current, target);
    let mut merged = Vec::with_capacity(target.len());
    merged.extend_from_slice(&current[..k]);
    merged.extend_from_slice(&target[k..]);
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDirection {
    Prev,
    Next,
}

/// Why a navigation request left the displayed path untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavStop {
    AtFirstPath,
    AtLastPath,
    TargetNotFound,
    ChainEnd,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// The displayed path changed; `preserved` leading ids were kept in place.
    Switched { preserved: usize },
    /// A fresh enumeration was accepted without changing the displayed path.
    Refreshed,
    Unchanged(NavStop),
}

impl NavOutcome {
    pub fn is_switched(&self) -> bool {
        matches!(self, Self::Switched { .. })
    }
}

/// Client-side branch state: the displayed path plus the enumeration it was
/// chosen from. Owned by the caller; nothing here is shared.
#[derive(Debug, Clone)]
pub struct BranchNavigator {
    current_path: Vec<MessageId>,
    paths: Vec<Path>,
    max_chain_length: usize,
}

impl Default for BranchNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchNavigator {
    pub fn new() -> Self {
        Self {
            current_path: Vec::new(),
            paths: Vec::new(),
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }

    /// Start displaying `current_path` against an already fetched enumeration.
    pub fn with_state(current_path: Vec<MessageId>, paths: Vec<Path>) -> Self {
        Self {
            current_path,
            paths,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }

    pub fn with_max_chain_length(mut self, limit: usize) -> Self {
        self.max_chain_length = limit;
        self
    }

    pub fn current_path(&self) -> &[MessageId] {
        &self.current_path
    }

    pub fn current_leaf(&self) -> Option<MessageId> {
        self.current_path.last().copied()
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Index of the enumerated path containing the current leaf.
    pub fn current_index(&self) -> Option<usize> {
        let leaf = self.current_leaf()?;
        self.paths.iter().position(|p| p.contains(leaf))
    }

    /// Take a freshly fetched enumeration. A result that no longer contains the
    /// current leaf is a stale response and is discarded.
    pub fn accept_paths(&mut self, paths: Vec<Path>) -> NavOutcome {
        let Some(leaf) = self.current_leaf() else {
            self.paths = paths;
            let Some(first) = self.paths.first() else {
                return NavOutcome::Refreshed;
            };
            self.current_path = first.ids.clone();
            return NavOutcome::Switched { preserved: 0 };
        };
        if !paths.iter().any(|p| p.contains(leaf)) {
            tracing::warn!(leaf = %leaf, paths = paths.len(), "discarding stale path enumeration");
            return NavOutcome::Unchanged(NavStop::Stale);
        }
        self.paths = paths;
        NavOutcome::Refreshed
    }

    /// Switch to `target`, keeping the common prefix with the displayed path.
    pub fn select_path(&mut self, target: &[MessageId]) -> NavOutcome {
        let Some(&target_leaf) = target.last() else {
            return NavOutcome::Unchanged(NavStop::TargetNotFound);
        };
        if !self.paths.is_empty() && !self.paths.iter().any(|p| p.contains(target_leaf)) {
            return NavOutcome::Unchanged(NavStop::Stale);
        }
        let preserved = common_prefix_len(&self.current_path, target);
        self.current_path = select_path(&self.current_path, target);
        NavOutcome::Switched { preserved }
    }

    pub fn next_path(&mut self) -> NavOutcome {
        let Some(index) = self.current_index() else {
            return NavOutcome::Unchanged(NavStop::TargetNotFound);
        };
        if index + 1 >= self.paths.len() {
            return NavOutcome::Unchanged(NavStop::AtLastPath);
        }
        self.switch_to_index(index + 1)
    }

    pub fn prev_path(&mut self) -> NavOutcome {
        let Some(index) = self.current_index() else {
            return NavOutcome::Unchanged(NavStop::TargetNotFound);
        };
        if index == 0 {
            return NavOutcome::Unchanged(NavStop::AtFirstPath);
        }
        self.switch_to_index(index - 1)
    }

    /// Step one version along an edit chain: `Prev` to the path holding the
    /// message this one was edited from, `Next` to the path holding its direct
    /// successor edit. Corrupt edit links are the only error.
    pub fn jump_to_edited_version(
        &mut self,
        message_id: MessageId,
        direction: EditDirection,
    ) -> Result<NavOutcome, CoreError> {
        let target = {
            let index = EditIndex::new(self.snapshot_messages())
                .with_max_chain_length(self.max_chain_length);
            if !index.contains(message_id) {
                return Ok(NavOutcome::Unchanged(NavStop::TargetNotFound));
            }
            match direction {
                EditDirection::Prev => index.predecessor(message_id)?,
                EditDirection::Next => index.successor(message_id)?,
            }
        };
        let Some(target) = target else {
            return Ok(NavOutcome::Unchanged(NavStop::ChainEnd));
        };
        let Some(path) = self.paths.iter().find(|p| p.contains(target)) else {
            return Ok(NavOutcome::Unchanged(NavStop::TargetNotFound));
        };
        let ids = path.ids.clone();
        Ok(self.select_path(&ids))
    }

    fn switch_to_index(&mut self, index: usize) -> NavOutcome {
        let ids = self.paths[index].ids.clone();
        self.select_path(&ids)
    }

    fn snapshot_messages(&self) -> impl Iterator<Item = &Message> {
        let mut seen = HashSet::new();
        self.paths
            .iter()
            .flat_map(|p| p.messages.iter())
            .filter(move |m| seen.insert(m.id))
    }
}
