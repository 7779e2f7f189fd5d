//! Storage collaborators of a sequencing pass.
//!
//! [`AdminStorage`] resolves log configuration, [`LogStorage`] reads a log's
//! queue and tree and commits a pass. Both are implemented for
//! [`treehead_datastore::LogDatastore`] in [`datastore`].

use async_trait::async_trait;
use thiserror::Error;
use treehead_datastore::models::{LogTree, PendingLeaf, SequencedLeaf, SignedTreeHead, TreeState, TreeType};

pub mod datastore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("log {0} not found")]
    NotFound(i64),

    #[error("log {log_id} is a {actual:?} tree, expected {expected:?}")]
    WrongType {
        log_id: i64,
        expected: TreeType,
        actual: TreeType,
    },

    #[error("log {0} is frozen")]
    Frozen(i64),

    #[error("commit conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Datastore(#[from] treehead_datastore::Error),
}

#[async_trait]
pub trait AdminStorage: Send + Sync {
    /// The writable tree `log_id`, provided it exists and is of `expected` type.
    async fn resolve_log_config(&self, log_id: i64, expected: TreeType) -> Result<LogTree, StorageError>;
}

#[async_trait]
pub trait LogStorage: Send + Sync {
    async fn read_tree_state(&self, log_id: i64) -> Result<Option<TreeState>, StorageError>;

    async fn read_current_tree_head(&self, log_id: i64) -> Result<Option<SignedTreeHead>, StorageError>;

    /// Up to `limit` pending leaves, oldest queue timestamp first.
    async fn fetch_pending_leaves(&self, log_id: i64, limit: usize) -> Result<Vec<PendingLeaf>, StorageError>;

    /// Persists `leaves`, `state` and `head` as one unit and removes the
    /// pending entries the leaves came from.
    ///
    /// Fails with [`StorageError::Conflict`], writing nothing, when the log's
    /// current revision is no longer `expected_prior_revision` or a consumed
    /// pending entry has already disappeared.
    async fn commit_batch(
        &self,
        log_id: i64,
        leaves: &[SequencedLeaf],
        state: &TreeState,
        head: &SignedTreeHead,
        expected_prior_revision: u64,
    ) -> Result<(), StorageError>;
}
