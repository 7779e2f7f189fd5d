pub mod log_tree;
pub mod pending_leaf;
pub mod sequenced_leaf;
pub mod signed_tree_head;
pub mod tree_state;

pub use log_tree::{HashStrategy, LogTree, TreeStatus, TreeType};
pub use pending_leaf::PendingLeaf;
pub use sequenced_leaf::SequencedLeaf;
pub use signed_tree_head::SignedTreeHead;
pub use tree_state::TreeState;

/// Zero-padded so that lexicographic key order matches numeric order.
pub(crate) fn padded(value: u64) -> String {
    format!("{:020}", value)
}
