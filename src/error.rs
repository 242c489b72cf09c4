use thiserror::Error;

use crate::model::{GroupKey, NodeId};

/// Errors produced by tree operations and gesture resolution.
///
/// None of these reach the end user: gesture paths log them and leave the
/// tree untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("index {index} out of bounds for sibling group {group} (len {len})")]
    InvalidIndex {
        group: GroupKey,
        index: usize,
        len: usize,
    },
    #[error("node `{0}` not found")]
    NotFound(NodeId),
    #[error("`{active}` and `{target}` belong to different sibling groups")]
    CrossGroupDrop { active: NodeId, target: NodeId },
    #[error("node id `{0}` appears more than once")]
    DuplicateId(NodeId),
    #[error("node `{0}` is a leaf and has no children")]
    NotAContainer(NodeId),
}
