use std::collections::BTreeMap;

use crate::ids::MessageId;
use crate::paths::Path;

/// "n of m" counter shown next to an edited message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchPosition {
    /// 1-based index of the displayed path among all paths.
    pub current_index: usize,
    pub total: usize,
}

pub fn paths_containing(message_id: MessageId, paths: &[Path]) -> Vec<&Path> {
    paths.iter().filter(|p| p.contains(message_id)).collect()
}

/// Branch counters for every message that carries edit controls and appears
/// in at least one path.
pub fn branch_positions(
    paths: &[Path],
    current_path: &[MessageId],
) -> BTreeMap<MessageId, BranchPosition> {
    let current_index = paths
        .iter()
        .position(|p| p.ids == current_path)
        .map_or(1, |i| i + 1);
    let position = BranchPosition {
        current_index,
        total: paths.len(),
    };

    paths
        .iter()
        .flat_map(|p| p.messages.iter())
        .filter(|m| m.has_branch_controls())
        .map(|m| (m.id, position))
        .collect()
}
