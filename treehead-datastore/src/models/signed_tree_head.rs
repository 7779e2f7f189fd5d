use crate::models::padded;
use crate::{Error, LogDatastore, Model, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rocksdb::WriteBatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use treehead_utils::json_stringify_deterministic::stringify_deterministic;
use treehead_utils::keypair::Keypair;

/// A checkpoint of a log: size, root, time and revision, signed by the
/// log's key.
///
/// Each committed head is stored twice: under its revision as immutable
/// history, and under the log's current-head key which always points at the
/// latest revision.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignedTreeHead {
    pub log_id: i64,
    pub tree_size: u64,
    /// hex
    pub root_hash: String,
    pub timestamp_nanos: i64,
    pub revision: u64,
    /// base64; absent until signed
    pub signature: Option<String>,
}

impl Model for SignedTreeHead {
    const ID_PATH: &'static str = "/heads/${log_id}/${revision}";

    fn get_id_keys(&self) -> HashMap<String, String> {
        HashMap::from([
            ("log_id".to_string(), self.log_id.to_string()),
            ("revision".to_string(), padded(self.revision)),
        ])
    }
}

impl SignedTreeHead {
    pub fn new(log_id: i64, tree_size: u64, root_hash: &[u8], timestamp_nanos: i64, revision: u64) -> Self {
        Self {
            log_id,
            tree_size,
            root_hash: hex::encode(root_hash),
            timestamp_nanos,
            revision,
            signature: None,
        }
    }

    pub fn current_id(log_id: i64) -> String {
        format!("/current_head/{}", log_id)
    }

    pub fn root_hash_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.root_hash)
            .map_err(|e| Error::InvalidData(format!("root hash of log {}: {}", self.log_id, e)))
    }

    /// The fields covered by the signature.
    pub fn canonical_json(&self) -> serde_json::Value {
        serde_json::json!({
            "log_id": self.log_id,
            "tree_size": self.tree_size,
            "root_hash": self.root_hash,
            "timestamp_nanos": self.timestamp_nanos,
            "revision": self.revision,
        })
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        stringify_deterministic(&self.canonical_json(), None).into_bytes()
    }

    pub fn set_signature(&mut self, signature: &[u8]) {
        self.signature = Some(BASE64.encode(signature));
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| Error::InvalidData(format!("head {} of log {} is unsigned", self.revision, self.log_id)))?;
        BASE64
            .decode(signature)
            .map_err(|e| Error::InvalidData(format!("signature of log {}: {}", self.log_id, e)))
    }

    pub fn verify(&self, keypair: &Keypair) -> Result<bool> {
        Ok(keypair.verify_signature_for_bytes(&self.signature_bytes()?, &self.canonical_bytes()))
    }

    /// Stages this head as both history and the log's current head.
    pub fn save_as_current_to_batch(&self, batch: &mut WriteBatch) -> Result<()> {
        self.save_to_batch(batch)?;
        batch.put(Self::current_id(self.log_id), self.to_json_string()?);
        Ok(())
    }

    pub async fn find_current(datastore: &LogDatastore, log_id: i64) -> Result<Option<Self>> {
        datastore.get_json(&Self::current_id(log_id)).await
    }

    pub async fn find_by_revision(datastore: &LogDatastore, log_id: i64, revision: u64) -> Result<Option<Self>> {
        Self::find_one(
            datastore,
            HashMap::from([
                ("log_id".to_string(), log_id.to_string()),
                ("revision".to_string(), padded(revision)),
            ]),
        )
        .await
    }

    pub async fn find_max_revision(datastore: &LogDatastore, log_id: i64) -> Result<Option<u64>> {
        datastore.find_max_int_key(&format!("/heads/{}", log_id)).await
    }
}
