use crate::models::padded;
use crate::{Error, LogDatastore, Model, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A queued submission waiting to be given a sequence number.
///
/// Stored under its queue timestamp so that iterating a log's pending
/// prefix yields the oldest entries first; `queue_id` breaks ties between
/// entries queued in the same nanosecond, including duplicate leaf hashes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PendingLeaf {
    pub log_id: i64,
    pub queue_id: String,
    /// base64
    pub leaf_value: String,
    /// hex; the Merkle leaf hash computed at submission time
    pub leaf_hash: String,
    /// base64
    #[serde(default)]
    pub extra_data: String,
    pub queue_timestamp_nanos: i64,
}

impl Model for PendingLeaf {
    const ID_PATH: &'static str = "/pending/${log_id}/${queue_timestamp}/${queue_id}";

    fn get_id_keys(&self) -> HashMap<String, String> {
        Self::id_keys(self.log_id, self.queue_timestamp_nanos, &self.queue_id)
    }
}

impl PendingLeaf {
    pub fn new(
        log_id: i64,
        leaf_value: &[u8],
        leaf_hash: &[u8],
        extra_data: &[u8],
        queue_timestamp_nanos: i64,
    ) -> Self {
        Self {
            log_id,
            queue_id: uuid::Uuid::new_v4().to_string(),
            leaf_value: BASE64.encode(leaf_value),
            leaf_hash: hex::encode(leaf_hash),
            extra_data: BASE64.encode(extra_data),
            queue_timestamp_nanos,
        }
    }

    /// Timestamps before the epoch all share the zero key segment, so they
    /// sort ahead of every later entry but only by `queue_id` among themselves.
    pub(crate) fn id_keys(log_id: i64, queue_timestamp_nanos: i64, queue_id: &str) -> HashMap<String, String> {
        HashMap::from([
            ("log_id".to_string(), log_id.to_string()),
            (
                "queue_timestamp".to_string(),
                padded(queue_timestamp_nanos.max(0) as u64),
            ),
            ("queue_id".to_string(), queue_id.to_string()),
        ])
    }

    pub fn leaf_hash_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.leaf_hash)
            .map_err(|e| Error::InvalidData(format!("leaf hash of {}: {}", self.queue_id, e)))
    }

    pub fn leaf_value_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.leaf_value)
            .map_err(|e| Error::InvalidData(format!("leaf value of {}: {}", self.queue_id, e)))
    }

    /// Up to `limit` pending leaves of `log_id`, oldest queue timestamp first.
    pub async fn find_oldest(datastore: &LogDatastore, log_id: i64, limit: usize) -> Result<Vec<Self>> {
        Self::find_all_below(datastore, &format!("/pending/{}", log_id), Some(limit)).await
    }

    pub async fn count_for_log(datastore: &LogDatastore, log_id: i64) -> Result<u64> {
        datastore.count_keys(&format!("/pending/{}", log_id)).await
    }
}
