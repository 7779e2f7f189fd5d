use crate::{LogDatastore, Model, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreeType {
    Log,
    Map,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TreeStatus {
    #[default]
    Active,
    Frozen,
}

/// Merkle hashing scheme configured for a tree.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HashStrategy {
    #[default]
    Unspecified,
    Rfc6962Sha256,
    Rfc6962Sha512,
}

/// Administrative record for one verifiable log.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LogTree {
    pub log_id: i64,
    pub tree_type: TreeType,
    #[serde(default)]
    pub tree_status: TreeStatus,
    #[serde(default)]
    pub hash_strategy: HashStrategy,
    /// Name of the signing key used for this tree's heads.
    pub key_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: i64,
}

impl Model for LogTree {
    const ID_PATH: &'static str = "/trees/${log_id}";

    fn get_id_keys(&self) -> HashMap<String, String> {
        HashMap::from([("log_id".to_string(), self.log_id.to_string())])
    }
}

impl LogTree {
    pub fn new(log_id: i64, key_id: &str, hash_strategy: HashStrategy) -> Self {
        Self {
            log_id,
            tree_type: TreeType::Log,
            tree_status: TreeStatus::Active,
            hash_strategy,
            key_id: key_id.to_string(),
            display_name: None,
            deleted: false,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub async fn find_by_id(datastore: &LogDatastore, log_id: i64) -> Result<Option<Self>> {
        Self::find_one(datastore, HashMap::from([("log_id".to_string(), log_id.to_string())])).await
    }
}
