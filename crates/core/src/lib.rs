pub mod chain;
pub mod dedup;
pub mod error;
pub mod ids;
pub mod message;
pub mod navigator;
pub mod paths;
pub mod position;

#[cfg(test)]
pub(crate) mod test_support;

pub use chain::{DEFAULT_MAX_CHAIN_LENGTH, EditIndex};
pub use dedup::{Divergence, MessageGroups, dedup_across_paths};
pub use error::CoreError;
pub use ids::*;
pub use message::{Message, NewMessage, RawMessage};
pub use navigator::{
    BranchNavigator, EditDirection, NavOutcome, NavStop, common_prefix_len, select_path,
};
pub use paths::{Path, enumerate_paths, path_ids};
pub use position::{BranchPosition, branch_positions, paths_containing};
