use crate::models::{padded, PendingLeaf};
use crate::{Error, LogDatastore, Model, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A leaf with its permanent position in the log. Written once, never updated.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SequencedLeaf {
    pub log_id: i64,
    /// Sequence number; also the Merkle leaf index.
    pub leaf_index: u64,
    pub leaf_value: String,
    pub leaf_hash: String,
    #[serde(default)]
    pub extra_data: String,
    pub queue_id: String,
    pub queue_timestamp_nanos: i64,
    pub integrate_timestamp_nanos: i64,
}

impl Model for SequencedLeaf {
    const ID_PATH: &'static str = "/leaves/${log_id}/${leaf_index}";

    fn get_id_keys(&self) -> HashMap<String, String> {
        HashMap::from([
            ("log_id".to_string(), self.log_id.to_string()),
            ("leaf_index".to_string(), padded(self.leaf_index)),
        ])
    }
}

impl SequencedLeaf {
    pub fn from_pending(pending: PendingLeaf, leaf_index: u64, integrate_timestamp_nanos: i64) -> Self {
        Self {
            log_id: pending.log_id,
            leaf_index,
            leaf_value: pending.leaf_value,
            leaf_hash: pending.leaf_hash,
            extra_data: pending.extra_data,
            queue_id: pending.queue_id,
            queue_timestamp_nanos: pending.queue_timestamp_nanos,
            integrate_timestamp_nanos,
        }
    }

    /// Key of the pending entry this leaf was sequenced from.
    pub fn pending_id(&self) -> Result<String> {
        PendingLeaf::get_id_for(&PendingLeaf::id_keys(
            self.log_id,
            self.queue_timestamp_nanos,
            &self.queue_id,
        ))
    }

    pub fn leaf_hash_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.leaf_hash)
            .map_err(|e| Error::InvalidData(format!("leaf hash at index {}: {}", self.leaf_index, e)))
    }

    pub async fn find_by_index(datastore: &LogDatastore, log_id: i64, leaf_index: u64) -> Result<Option<Self>> {
        Self::find_one(
            datastore,
            HashMap::from([
                ("log_id".to_string(), log_id.to_string()),
                ("leaf_index".to_string(), padded(leaf_index)),
            ]),
        )
        .await
    }

    /// Every sequenced leaf of `log_id` in leaf index order.
    pub async fn find_all_for_log(datastore: &LogDatastore, log_id: i64) -> Result<Vec<Self>> {
        Self::find_all_below(datastore, &format!("/leaves/{}", log_id), None).await
    }

    pub async fn count_for_log(datastore: &LogDatastore, log_id: i64) -> Result<u64> {
        datastore.count_keys(&format!("/leaves/{}", log_id)).await
    }
}
