use sha2::{Digest, Sha256, Sha512};
use std::marker::PhantomData;
use std::sync::Arc;
use treehead_datastore::models::{HashStrategy, LogTree};

use crate::error::{Result, SequencingError};

// RFC 6962 domain separation
const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Merkle hashing for one log, chosen once when the log is resolved.
pub trait HashFunction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Length in bytes of every hash this function produces.
    fn size(&self) -> usize;

    /// Root of a tree with no leaves.
    fn empty_root(&self) -> Vec<u8>;

    fn hash_leaf(&self, leaf: &[u8]) -> Vec<u8>;

    fn hash_children(&self, left: &[u8], right: &[u8]) -> Vec<u8>;
}

/// RFC 6962 tree hashing over any fixed-output digest.
pub struct Rfc6962Hasher<D> {
    name: &'static str,
    _digest: PhantomData<fn() -> D>,
}

impl<D: Digest> Rfc6962Hasher<D> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            _digest: PhantomData,
        }
    }
}

impl<D: Digest> HashFunction for Rfc6962Hasher<D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn size(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn empty_root(&self) -> Vec<u8> {
        D::digest(b"").to_vec()
    }

    fn hash_leaf(&self, leaf: &[u8]) -> Vec<u8> {
        let mut h = D::new();
        h.update([LEAF_PREFIX]);
        h.update(leaf);
        h.finalize().to_vec()
    }

    fn hash_children(&self, left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut h = D::new();
        h.update([NODE_PREFIX]);
        h.update(left);
        h.update(right);
        h.finalize().to_vec()
    }
}

pub fn rfc6962_sha256() -> Rfc6962Hasher<Sha256> {
    Rfc6962Hasher::new("RFC6962_SHA256")
}

pub fn rfc6962_sha512() -> Rfc6962Hasher<Sha512> {
    Rfc6962Hasher::new("RFC6962_SHA512")
}

/// The hash function configured for `tree`.
pub fn hasher_for(tree: &LogTree) -> Result<Arc<dyn HashFunction>> {
    match tree.hash_strategy {
        HashStrategy::Rfc6962Sha256 => Ok(Arc::new(rfc6962_sha256())),
        HashStrategy::Rfc6962Sha512 => Ok(Arc::new(rfc6962_sha512())),
        other => Err(SequencingError::HasherUnavailable(other)),
    }
}
