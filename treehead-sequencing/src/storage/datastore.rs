use async_trait::async_trait;
use treehead_datastore::models::{
    LogTree, PendingLeaf, SequencedLeaf, SignedTreeHead, TreeState, TreeStatus, TreeType,
};
use treehead_datastore::{LogDatastore, Model, WriteBatch};

use super::{AdminStorage, LogStorage, StorageError};

#[async_trait]
impl AdminStorage for LogDatastore {
    async fn resolve_log_config(&self, log_id: i64, expected: TreeType) -> Result<LogTree, StorageError> {
        let tree = match LogTree::find_by_id(self, log_id).await? {
            Some(tree) if !tree.deleted => tree,
            _ => return Err(StorageError::NotFound(log_id)),
        };
        if tree.tree_type != expected {
            return Err(StorageError::WrongType {
                log_id,
                expected,
                actual: tree.tree_type,
            });
        }
        if tree.tree_status == TreeStatus::Frozen {
            return Err(StorageError::Frozen(log_id));
        }
        Ok(tree)
    }
}

#[async_trait]
impl LogStorage for LogDatastore {
    async fn read_tree_state(&self, log_id: i64) -> Result<Option<TreeState>, StorageError> {
        Ok(TreeState::find_by_log(self, log_id).await?)
    }

    async fn read_current_tree_head(&self, log_id: i64) -> Result<Option<SignedTreeHead>, StorageError> {
        Ok(SignedTreeHead::find_current(self, log_id).await?)
    }

    async fn fetch_pending_leaves(&self, log_id: i64, limit: usize) -> Result<Vec<PendingLeaf>, StorageError> {
        Ok(PendingLeaf::find_oldest(self, log_id, limit).await?)
    }

    async fn commit_batch(
        &self,
        log_id: i64,
        leaves: &[SequencedLeaf],
        state: &TreeState,
        head: &SignedTreeHead,
        expected_prior_revision: u64,
    ) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        let mut pending_ids = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            leaf.save_to_batch(&mut batch)?;
            let pending_id = leaf.pending_id()?;
            batch.delete(&pending_id);
            pending_ids.push(pending_id);
        }
        state.save_to_batch(&mut batch)?;
        head.save_as_current_to_batch(&mut batch)?;

        let _guard = self.commit_lock().await;

        let current_revision = SignedTreeHead::find_current(self, log_id)
            .await?
            .map_or(0, |h| h.revision);
        if current_revision != expected_prior_revision {
            return Err(StorageError::Conflict(format!(
                "log {} is at revision {}, pass expected {}",
                log_id, current_revision, expected_prior_revision
            )));
        }
        for pending_id in &pending_ids {
            if !self.has_key(pending_id).await? {
                return Err(StorageError::Conflict(format!(
                    "pending entry {} was already consumed",
                    pending_id
                )));
            }
        }

        self.write(batch).await?;
        Ok(())
    }
}
