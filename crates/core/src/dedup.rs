use std::collections::{HashMap, HashSet};

use crate::ids::MessageId;
use crate::paths::Path;

/// Drop from each sequence every id already emitted by an earlier sequence.
///
/// The output has the same number of sequences as the input and each keeps the
/// relative order of its surviving ids.
pub fn dedup_across_paths(paths: &[Vec<MessageId>]) -> Vec<Vec<MessageId>> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .map(|path| path.iter().copied().filter(|id| seen.insert(*id)).collect())
        .collect()
}

/// Where a branch group leaves previously seen history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    pub group: usize,
    pub first: MessageId,
    pub parent: Option<MessageId>,
}

/// Disjoint "newly introduced ids" per enumerated path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageGroups {
    groups: Vec<Vec<MessageId>>,
    parents: HashMap<MessageId, Option<MessageId>>,
}

impl MessageGroups {
    pub fn from_paths(paths: &[Path]) -> Self {
        let ids: Vec<Vec<MessageId>> = paths.iter().map(|p| p.ids.clone()).collect();
        let parents = paths
            .iter()
            .flat_map(|p| p.messages.iter())
            .map(|m| (m.id, m.parent_message_id))
            .collect();
        Self {
            groups: dedup_across_paths(&ids),
            parents,
        }
    }

    pub fn from_id_paths(paths: &[Vec<MessageId>]) -> Self {
        Self {
            groups: dedup_across_paths(paths),
            parents: HashMap::new(),
        }
    }

    pub fn groups(&self) -> &[Vec<MessageId>] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Vec<MessageId>> {
        self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Index of the group holding `id`.
    pub fn group_of(&self, id: MessageId) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(&id))
    }

    /// Attach freshly created ids to the group containing `anchor`, or open a
    /// new group when there is no anchor or it is not indexed. Ids already
    /// present in some group are skipped. Returns the group index used.
    pub fn extend_group(&mut self, anchor: Option<MessageId>, new_ids: &[MessageId]) -> usize {
        let fresh: Vec<MessageId> = new_ids
            .iter()
            .copied()
            .filter(|id| self.group_of(*id).is_none())
            .collect();
        match anchor.and_then(|a| self.group_of(a)) {
            Some(index) => {
                self.groups[index].extend(fresh);
                index
            }
            None => {
                self.groups.push(fresh);
                self.groups.len() - 1
            }
        }
    }

    /// For every non-empty group after the first, the first newly introduced id
    /// and the parent it hangs off. Groups whose parents are unknown (built from
    /// bare ids) report `parent: None`.
    pub fn divergence_points(&self) -> Vec<Divergence> {
        self.groups
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(group, ids)| {
                let first = *ids.first()?;
                Some(Divergence {
                    group,
                    first,
                    parent: self.parents.get(&first).copied().flatten(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ConversationId, message_ids as ids};
    use crate::paths::enumerate_paths;
    use crate::test_support::msg;

    #[test]
    fn shared_prefixes_are_emitted_once() {
        let input = vec![ids(&[1, 2, 3]), ids(&[1, 4]), ids(&[1, 4, 6])];
        let out = dedup_across_paths(&input);
        assert_eq!(out, vec![ids(&[1, 2, 3]), ids(&[4]), ids(&[6])]);
    }

    #[test]
    fn output_is_disjoint_and_order_preserving() {
        let input = vec![
            ids(&[5, 1, 9]),
            ids(&[9, 2, 5, 3]),
            ids(&[3, 4, 1, 7]),
            ids(&[]),
            ids(&[7, 8]),
        ];
        let out = dedup_across_paths(&input);
        assert_eq!(out.len(), input.len());

        let flat: Vec<MessageId> = out.iter().flatten().copied().collect();
        let unique: HashSet<MessageId> = flat.iter().copied().collect();
        assert_eq!(flat.len(), unique.len());

        for (kept, original) in out.iter().zip(&input) {
            let positions: Vec<usize> = kept
                .iter()
                .map(|id| original.iter().position(|o| o == id).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn empty_shapes_pass_through() {
        assert!(dedup_across_paths(&[]).is_empty());
        let empties = vec![Vec::new(), Vec::new()];
        assert_eq!(dedup_across_paths(&empties), empties);
    }

    #[test]
    fn new_replies_join_the_anchor_group() {
        let mut groups = MessageGroups::from_id_paths(&[ids(&[1, 2, 3]), ids(&[1, 4])]);
        assert_eq!(groups.extend_group(Some(MessageId::new(4)), &ids(&[7, 8])), 1);
        assert_eq!(groups.groups()[1], ids(&[4, 7, 8]));
        assert_eq!(groups.group_of(MessageId::new(8)), Some(1));

        // No anchor starts a fresh group; duplicates are not re-added.
        assert_eq!(groups.extend_group(None, &ids(&[9, 8])), 2);
        assert_eq!(groups.groups()[2], ids(&[9]));

        // Unknown anchors also start a new group.
        assert_eq!(groups.extend_group(Some(MessageId::new(42)), &ids(&[10])), 3);
    }

    #[test]
    fn divergence_points_name_the_fork_parent() {
        let c = ConversationId::new();
        let messages = vec![
            msg(c, 1, None, None),
            msg(c, 2, Some(1), None),
            msg(c, 3, Some(2), None),
            msg(c, 4, Some(1), Some(2)),
            msg(c, 5, Some(4), None),
        ];
        let paths = enumerate_paths(c, &messages).unwrap();
        let groups = MessageGroups::from_paths(&paths);
        assert_eq!(groups.groups(), &[ids(&[1, 2, 3]), ids(&[4, 5])]);
        assert_eq!(
            groups.divergence_points(),
            vec![Divergence {
                group: 1,
                first: MessageId::new(4),
                parent: Some(MessageId::new(1)),
            }]
        );
    }
}
