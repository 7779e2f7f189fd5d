use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use treehead_datastore::models::LogTree;
use treehead_utils::keypair::Keypair;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing key {key_id} unavailable: {reason}")]
    KeyUnavailable { key_id: String, reason: String },

    #[error("signer rejected request: {0}")]
    Rejected(String),
}

/// Produces signatures over tree head encodings for one log.
pub trait Signer: Send + Sync {
    fn public_key_id(&self) -> String;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;
}

impl Signer for Keypair {
    fn public_key_id(&self) -> String {
        self.as_public_address()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        self.sign_bytes(message)
            .map_err(|e| SignerError::Rejected(e.to_string()))
    }
}

/// Hands out the signer for a log's configured key.
#[async_trait]
pub trait SignerFactory: Send + Sync {
    async fn signer_for(&self, tree: &LogTree) -> Result<Arc<dyn Signer>, SignerError>;
}

/// Loads `<key_dir>/<key_id>.keypair.json` for every request, so rotating or
/// removing a key file takes effect on the next pass.
pub struct KeyDirSignerFactory {
    key_dir: PathBuf,
}

impl KeyDirSignerFactory {
    pub fn new(key_dir: &Path) -> Self {
        Self {
            key_dir: key_dir.to_path_buf(),
        }
    }

    pub fn key_path(&self, key_id: &str) -> PathBuf {
        self.key_dir.join(format!("{}.keypair.json", key_id))
    }
}

#[async_trait]
impl SignerFactory for KeyDirSignerFactory {
    async fn signer_for(&self, tree: &LogTree) -> Result<Arc<dyn Signer>, SignerError> {
        let unavailable = |reason: String| SignerError::KeyUnavailable {
            key_id: tree.key_id.clone(),
            reason,
        };

        if tree.key_id.is_empty() || tree.key_id.contains(&['/', '\\'][..]) || tree.key_id.contains("..")
        {
            return Err(unavailable("invalid key id".to_string()));
        }

        let path = self.key_path(&tree.key_id);
        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))?;
        let keypair = Keypair::from_json_string(&json).map_err(|e| unavailable(e.to_string()))?;
        if !keypair.has_private_key() {
            return Err(unavailable("key file holds no private key".to_string()));
        }
        Ok(Arc::new(keypair))
    }
}

/// Signers registered up front by key id.
#[derive(Default, Clone)]
pub struct StaticSignerFactory {
    signers: HashMap<String, Arc<dyn Signer>>,
}

impl StaticSignerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signer(mut self, key_id: &str, signer: Arc<dyn Signer>) -> Self {
        self.signers.insert(key_id.to_string(), signer);
        self
    }
}

#[async_trait]
impl SignerFactory for StaticSignerFactory {
    async fn signer_for(&self, tree: &LogTree) -> Result<Arc<dyn Signer>, SignerError> {
        self.signers
            .get(&tree.key_id)
            .cloned()
            .ok_or_else(|| SignerError::KeyUnavailable {
                key_id: tree.key_id.clone(),
                reason: "no signer registered".to_string(),
            })
    }
}
