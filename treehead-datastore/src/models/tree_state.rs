use crate::{Error, LogDatastore, Model, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Compact Merkle state of a log: the roots of the perfect subtrees that
/// cover leaves `[0, size)`, largest (leftmost) first, one per set bit of
/// `size`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct TreeState {
    pub log_id: i64,
    pub size: u64,
    /// hex
    pub frontier: Vec<String>,
}

impl Model for TreeState {
    const ID_PATH: &'static str = "/tree_state/${log_id}";

    fn get_id_keys(&self) -> HashMap<String, String> {
        HashMap::from([("log_id".to_string(), self.log_id.to_string())])
    }
}

impl TreeState {
    pub fn new(log_id: i64, size: u64, frontier: &[Vec<u8>]) -> Self {
        Self {
            log_id,
            size,
            frontier: frontier.iter().map(hex::encode).collect(),
        }
    }

    pub fn frontier_bytes(&self) -> Result<Vec<Vec<u8>>> {
        self.frontier
            .iter()
            .map(|h| {
                hex::decode(h).map_err(|e| Error::InvalidData(format!("tree state of log {}: {}", self.log_id, e)))
            })
            .collect()
    }

    pub async fn find_by_log(datastore: &LogDatastore, log_id: i64) -> Result<Option<Self>> {
        Self::find_one(datastore, HashMap::from([("log_id".to_string(), log_id.to_string())])).await
    }
}
