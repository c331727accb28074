use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{ConversationId, MessageId};
use crate::message::Message;

/// One root-to-leaf conversation, ids and full payloads in root-first order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub ids: Vec<MessageId>,
    pub messages: Vec<Message>,
}

impl Path {
    pub fn leaf(&self) -> Option<MessageId> {
        self.ids.last().copied()
    }

    pub fn root(&self) -> Option<MessageId> {
        self.ids.first().copied()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Id sequences of `paths`, in the same order.
pub fn path_ids(paths: &[Path]) -> Vec<Vec<MessageId>> {
    paths.iter().map(|p| p.ids.clone()).collect()
}

/// Enumerate every root-to-leaf path of `conversation_id`.
///
/// Messages belonging to other conversations are ignored. Paths are ordered by
/// leaf id ascending so index-based navigation stays stable across calls.
/// Traversal uses an explicit stack; conversation depth is unbounded.
///
/// Fails with a corruption error when a parent is missing, a parent was created
/// after its child, or the parent links contain a cycle.
pub fn enumerate_paths(
    conversation_id: ConversationId,
    messages: &[Message],
) -> Result<Vec<Path>, CoreError> {
    let scoped: Vec<&Message> = messages
        .iter()
        .filter(|m| m.conversation_id == conversation_id)
        .collect();
    if scoped.is_empty() {
        tracing::debug!(conversation_id = %conversation_id, "no messages to enumerate");
        return Ok(Vec::new());
    }

    let mut index: HashMap<MessageId, usize> = HashMap::with_capacity(scoped.len());
    for (i, m) in scoped.iter().enumerate() {
        if index.insert(m.id, i).is_some() {
            return Err(CoreError::InvalidMessage(format!(
                "duplicate message id {}",
                m.id
            )));
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); scoped.len()];
    let mut roots = Vec::new();
    for (i, m) in scoped.iter().enumerate() {
        let Some(parent_id) = m.parent_message_id else {
            roots.push(i);
            continue;
        };
        let Some(&p) = index.get(&parent_id) else {
            return Err(corrupt(CoreError::MissingParent {
                message_id: m.id,
                parent_id,
            }));
        };
        if p == i {
            return Err(corrupt(CoreError::CycleDetected { message_id: m.id }));
        }
        if scoped[p].created_at > m.created_at {
            return Err(corrupt(CoreError::ForwardReference {
                message_id: m.id,
                parent_id,
            }));
        }
        children[p].push(i);
    }
    for list in &mut children {
        list.sort_by_key(|&c| scoped[c].id);
    }
    roots.sort_by_key(|&r| scoped[r].id);

    let mut visited = vec![false; scoped.len()];
    let mut visited_count = 0usize;
    let mut trail: Vec<usize> = Vec::new();
    let mut stack: Vec<(usize, usize)> = roots.iter().rev().map(|&r| (r, 0)).collect();
    let mut paths = Vec::new();

    while let Some((node, depth)) = stack.pop() {
        if visited[node] {
            return Err(corrupt(CoreError::CycleDetected {
                message_id: scoped[node].id,
            }));
        }
        visited[node] = true;
        visited_count += 1;

        trail.truncate(depth);
        trail.push(node);

        if children[node].is_empty() {
            paths.push(Path {
                ids: trail.iter().map(|&i| scoped[i].id).collect(),
                messages: trail.iter().map(|&i| scoped[i].clone()).collect(),
            });
        } else {
            for &child in children[node].iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }

    // Every node has an existing parent, so anything unreached hangs off a cycle.
    if visited_count < scoped.len() {
        let message_id = scoped
            .iter()
            .enumerate()
            .filter(|(i, _)| !visited[*i])
            .map(|(_, m)| m.id)
            .min()
            .unwrap_or(scoped[0].id);
        return Err(corrupt(CoreError::CycleDetected { message_id }));
    }

    paths.sort_by_key(|p| p.leaf());
    tracing::debug!(
        conversation_id = %conversation_id,
        messages = scoped.len(),
        paths = paths.len(),
        "enumerated conversation paths"
    );
    Ok(paths)
}

fn corrupt(err: CoreError) -> CoreError {
    tracing::warn!(error = %err, "message tree is corrupt");
    err
}
