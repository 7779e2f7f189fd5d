use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use base58::ToBase58;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use libp2p_identity::{Keypair as Libp2pKeypair, PublicKey as Libp2pPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json_stringify_deterministic::stringify_deterministic;

#[derive(Clone)]
pub enum KeypairOrPublicKey {
    Keypair(Libp2pKeypair),
    PublicKey(Libp2pPublicKey),
}

/// An ed25519 identity. Holding only the public half is allowed; such a
/// keypair verifies but refuses to sign.
#[derive(Clone)]
pub struct Keypair {
    pub inner: KeypairOrPublicKey,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("id", &self.as_public_address())
            .field("has_private_key", &self.has_private_key())
            .finish()
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct KeypairJSON {
    pub id: String,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl Keypair {
    pub fn new(key: KeypairOrPublicKey) -> Self {
        Self { inner: key }
    }

    pub fn generate() -> Result<Self> {
        Ok(Self::new(KeypairOrPublicKey::Keypair(
            Libp2pKeypair::generate_ed25519(),
        )))
    }

    pub fn has_private_key(&self) -> bool {
        matches!(self.inner, KeypairOrPublicKey::Keypair(_))
    }

    fn public_key(&self) -> Libp2pPublicKey {
        match &self.inner {
            KeypairOrPublicKey::Keypair(k) => k.public(),
            KeypairOrPublicKey::PublicKey(pk) => pk.clone(),
        }
    }

    fn uint8_array_as_base58_identity(bytes: &[u8]) -> String {
        let mut identity_hash = vec![0x00, bytes.len() as u8];
        identity_hash.extend_from_slice(bytes);
        identity_hash.to_base58()
    }

    pub fn public_key_as_base58_identity(&self) -> String {
        Self::uint8_array_as_base58_identity(&self.public_key().encode_protobuf())
    }

    pub fn as_public_address(&self) -> String {
        self.public_key_as_base58_identity()
    }

    pub fn public_key_as_base64_pad(&self) -> String {
        BASE64.encode(self.public_key().encode_protobuf())
    }

    pub fn private_key_as_base64_pad(&self) -> Result<String> {
        match &self.inner {
            KeypairOrPublicKey::Keypair(k) => Ok(BASE64.encode(k.to_protobuf_encoding()?)),
            KeypairOrPublicKey::PublicKey(_) => Err(anyhow!("No private key available")),
        }
    }

    pub fn public_only(&self) -> Self {
        Self::new(KeypairOrPublicKey::PublicKey(self.public_key()))
    }

    pub fn from_json(json: &KeypairJSON) -> Result<Self> {
        if let Some(private_key) = &json.private_key {
            let key_bytes = BASE64.decode(private_key)?;
            let key = Libp2pKeypair::from_protobuf_encoding(&key_bytes)?;
            Ok(Self::new(KeypairOrPublicKey::Keypair(key)))
        } else {
            let key_bytes = BASE64.decode(&json.public_key)?;
            let public_key = Libp2pPublicKey::try_decode_protobuf(&key_bytes)?;
            Ok(Self::new(KeypairOrPublicKey::PublicKey(public_key)))
        }
    }

    pub fn from_json_string(json_str: &str) -> Result<Self> {
        let json: KeypairJSON = serde_json::from_str(json_str)?;
        Self::from_json(&json)
    }

    pub fn from_json_file(filepath: &Path) -> Result<Self> {
        let json_str = fs::read_to_string(filepath)?;
        Self::from_json_string(&json_str)
    }

    pub fn as_public_json(&self) -> KeypairJSON {
        KeypairJSON {
            id: self.public_key_as_base58_identity(),
            public_key: self.public_key_as_base64_pad(),
            private_key: None,
        }
    }

    pub fn as_json(&self) -> KeypairJSON {
        KeypairJSON {
            id: self.public_key_as_base58_identity(),
            public_key: self.public_key_as_base64_pad(),
            private_key: self.private_key_as_base64_pad().ok(),
        }
    }

    pub fn as_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.as_json())?)
    }

    pub fn as_json_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.as_json_string()?)?;
        Ok(())
    }

    pub fn sign_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match &self.inner {
            KeypairOrPublicKey::Keypair(k) => Ok(k.sign(bytes)?),
            KeypairOrPublicKey::PublicKey(_) => Err(anyhow!("Cannot sign with public key only")),
        }
    }

    pub fn sign_json(&self, json: &Value) -> Result<String> {
        let str = stringify_deterministic(json, None);
        Ok(BASE64.encode(self.sign_bytes(str.as_bytes())?))
    }

    pub fn verify_signature_for_bytes(&self, signature: &[u8], bytes: &[u8]) -> bool {
        self.public_key().verify(bytes, signature)
    }

    pub fn verify_json(&self, signature: &str, json: &Value) -> Result<bool> {
        let signature_bytes = BASE64.decode(signature)?;
        let str = stringify_deterministic(json, None);
        Ok(self.verify_signature_for_bytes(&signature_bytes, str.as_bytes()))
    }
}
