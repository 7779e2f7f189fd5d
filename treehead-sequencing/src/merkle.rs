//! Incremental RFC 6962 Merkle tree over a compact frontier.
//!
//! A tree of `size` leaves is summarised by the roots of its maximal perfect
//! subtrees, one for each set bit of `size`, ordered left to right. Appending
//! a leaf merges at most `log2(size)` of them, and the tree root is a fold of
//! the frontier, so no previously sequenced leaf is ever rehashed.

use treehead_datastore::models::TreeState;

use crate::error::{Result, SequencingError};
use crate::hashers::HashFunction;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactRange {
    size: u64,
    frontier: Vec<Vec<u8>>,
}

impl CompactRange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the range persisted for a log, checking that its shape and
    /// hash lengths are consistent with `hasher`.
    pub fn from_state(state: &TreeState, hasher: &dyn HashFunction) -> Result<Self> {
        let frontier = state
            .frontier_bytes()
            .map_err(|e| SequencingError::InconsistentState(e.to_string()))?;
        if frontier.len() != state.size.count_ones() as usize {
            return Err(SequencingError::InconsistentState(format!(
                "log {}: {} frontier nodes for tree size {}",
                state.log_id,
                frontier.len(),
                state.size
            )));
        }
        if let Some(node) = frontier.iter().find(|n| n.len() != hasher.size()) {
            return Err(SequencingError::InconsistentState(format!(
                "log {}: frontier node of {} bytes, {} expects {}",
                state.log_id,
                node.len(),
                hasher.name(),
                hasher.size()
            )));
        }
        Ok(Self {
            size: state.size,
            frontier,
        })
    }

    pub fn to_state(&self, log_id: i64) -> TreeState {
        TreeState::new(log_id, self.size, &self.frontier)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends one leaf hash at index `self.size()`.
    pub fn append(&mut self, hasher: &dyn HashFunction, leaf_hash: Vec<u8>) {
        let mut node = leaf_hash;
        let mut bits = self.size;
        // each trailing one bit is a perfect subtree of the same height as `node`
        while bits & 1 == 1 {
            let Some(left) = self.frontier.pop() else {
                break;
            };
            node = hasher.hash_children(&left, &node);
            bits >>= 1;
        }
        self.frontier.push(node);
        self.size += 1;
    }

    pub fn root(&self, hasher: &dyn HashFunction) -> Vec<u8> {
        match self.frontier.split_last() {
            None => hasher.empty_root(),
            Some((last, rest)) => rest
                .iter()
                .rev()
                .fold(last.clone(), |acc, node| hasher.hash_children(node, &acc)),
        }
    }
}

/// Merkle Tree Hash of RFC 6962 section 2.1, computed from scratch.
pub fn root_from_leaf_hashes(hasher: &dyn HashFunction, leaf_hashes: &[Vec<u8>]) -> Vec<u8> {
    match leaf_hashes.len() {
        0 => hasher.empty_root(),
        1 => leaf_hashes[0].clone(),
        n => {
            // largest power of two strictly below n
            let split = 1usize << (usize::BITS - 1 - (n - 1).leading_zeros());
            let left = root_from_leaf_hashes(hasher, &leaf_hashes[..split]);
            let right = root_from_leaf_hashes(hasher, &leaf_hashes[split..]);
            hasher.hash_children(&left, &right)
        }
    }
}
