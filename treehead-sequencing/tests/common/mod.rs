#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use treehead_datastore::models::{
    HashStrategy, LogTree, PendingLeaf, SequencedLeaf, SignedTreeHead, TreeState,
};
use treehead_datastore::{LogDatastore, Model, WriteBatch};
use treehead_sequencing::hashers::{rfc6962_sha256, HashFunction};
use treehead_sequencing::merkle::{root_from_leaf_hashes, CompactRange};
use treehead_sequencing::signer::{Signer, SignerError, StaticSignerFactory};
use treehead_sequencing::storage::{LogStorage, StorageError};
use treehead_sequencing::time_source::FakeTimeSource;
use treehead_sequencing::{PassInfo, Registry, Sequencer, SequencerConfig, SequencerManager};
use treehead_utils::keypair::Keypair;

pub const LOG_ID: i64 = 1;
pub const KEY_ID: &str = "log-key";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn secs(s: i64) -> chrono::Duration {
    chrono::Duration::seconds(s)
}

pub fn nanos_of(time: DateTime<Utc>) -> i64 {
    time.timestamp_nanos_opt().unwrap()
}

/// An in-memory datastore holding one active SHA-256 log, its signing key
/// and a clock that stands still until advanced.
pub struct TestEnv {
    pub datastore: Arc<LogDatastore>,
    pub keypair: Keypair,
    pub clock: Arc<FakeTimeSource>,
    pub hasher: Arc<dyn HashFunction>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let datastore = Arc::new(LogDatastore::create_in_memory().unwrap());
        LogTree::new(LOG_ID, KEY_ID, HashStrategy::Rfc6962Sha256)
            .save(&datastore)
            .await
            .unwrap();
        Self {
            datastore,
            keypair: Keypair::generate().unwrap(),
            clock: Arc::new(FakeTimeSource::new(start_time())),
            hasher: Arc::new(rfc6962_sha256()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use treehead_sequencing::time_source::TimeSource;
        self.clock.now()
    }

    pub fn sequencer(&self, guard_window: Duration) -> Sequencer {
        self.sequencer_with(self.datastore.clone(), Arc::new(self.keypair.clone()), guard_window)
    }

    pub fn sequencer_with(
        &self,
        storage: Arc<dyn LogStorage>,
        signer: Arc<dyn Signer>,
        guard_window: Duration,
    ) -> Sequencer {
        let mut sequencer = Sequencer::new(self.hasher.clone(), self.clock.clone(), storage, signer);
        sequencer.set_guard_window(guard_window);
        sequencer
    }

    pub fn signer_factory(&self) -> StaticSignerFactory {
        StaticSignerFactory::new().with_signer(KEY_ID, Arc::new(self.keypair.clone()))
    }

    pub fn manager(&self, config: SequencerConfig) -> SequencerManager {
        let registry = Registry::with_datastore(self.datastore.clone(), Arc::new(self.signer_factory()));
        SequencerManager::new(registry, config)
    }

    pub fn pass_info(&self, batch_size: usize) -> PassInfo {
        PassInfo {
            batch_size,
            time_source: self.clock.clone(),
        }
    }

    /// Queues `data` as if it was submitted `age` before the current time.
    pub async fn queue_leaf(&self, data: &[u8], age: chrono::Duration) -> PendingLeaf {
        self.queue_leaf_at(data, nanos_of(self.now() - age)).await
    }

    pub async fn queue_leaf_at(&self, data: &[u8], queue_timestamp_nanos: i64) -> PendingLeaf {
        let leaf = PendingLeaf::new(
            LOG_ID,
            data,
            &self.hasher.hash_leaf(data),
            b"",
            queue_timestamp_nanos,
        );
        leaf.save(&self.datastore).await.unwrap();
        leaf
    }

    /// Writes a log that already holds `size` leaves under a head at
    /// `revision` signed `head_age` ago. Returns the seeded leaf hashes.
    pub async fn seed_tree(&self, size: u64, revision: u64, head_age: chrono::Duration) -> Vec<Vec<u8>> {
        let queued_at = nanos_of(self.now() - secs(3600));
        let mut range = CompactRange::new();
        let mut hashes = Vec::new();
        let mut batch = WriteBatch::default();

        for i in 0..size {
            let data = format!("seed-{}", i);
            let hash = self.hasher.hash_leaf(data.as_bytes());
            let pending = PendingLeaf::new(LOG_ID, data.as_bytes(), &hash, b"", queued_at);
            SequencedLeaf::from_pending(pending, i, queued_at)
                .save_to_batch(&mut batch)
                .unwrap();
            range.append(self.hasher.as_ref(), hash.clone());
            hashes.push(hash);
        }
        range.to_state(LOG_ID).save_to_batch(&mut batch).unwrap();

        let mut head = SignedTreeHead::new(
            LOG_ID,
            size,
            &range.root(self.hasher.as_ref()),
            nanos_of(self.now() - head_age),
            revision,
        );
        head.set_signature(&self.keypair.sign_bytes(&head.canonical_bytes()).unwrap());
        head.save_as_current_to_batch(&mut batch).unwrap();

        self.datastore.write(batch).await.unwrap();
        hashes
    }

    pub async fn current_head(&self) -> Option<SignedTreeHead> {
        SignedTreeHead::find_current(&self.datastore, LOG_ID).await.unwrap()
    }

    pub async fn tree_state(&self) -> Option<TreeState> {
        TreeState::find_by_log(&self.datastore, LOG_ID).await.unwrap()
    }

    pub async fn sequenced(&self) -> Vec<SequencedLeaf> {
        SequencedLeaf::find_all_for_log(&self.datastore, LOG_ID).await.unwrap()
    }

    pub async fn sequenced_hashes(&self) -> Vec<Vec<u8>> {
        self.sequenced()
            .await
            .iter()
            .map(|leaf| leaf.leaf_hash_bytes().unwrap())
            .collect()
    }

    pub async fn pending_count(&self) -> u64 {
        PendingLeaf::count_for_log(&self.datastore, LOG_ID).await.unwrap()
    }

    pub fn reference_root(&self, leaf_hashes: &[Vec<u8>]) -> Vec<u8> {
        root_from_leaf_hashes(self.hasher.as_ref(), leaf_hashes)
    }
}

/// Holds every commit until `parties` passes are ready to commit.
pub struct BarrierStorage {
    inner: Arc<LogDatastore>,
    barrier: Barrier,
}

impl BarrierStorage {
    pub fn new(inner: Arc<LogDatastore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl LogStorage for BarrierStorage {
    async fn read_tree_state(&self, log_id: i64) -> Result<Option<TreeState>, StorageError> {
        self.inner.read_tree_state(log_id).await
    }

    async fn read_current_tree_head(&self, log_id: i64) -> Result<Option<SignedTreeHead>, StorageError> {
        self.inner.read_current_tree_head(log_id).await
    }

    async fn fetch_pending_leaves(&self, log_id: i64, limit: usize) -> Result<Vec<PendingLeaf>, StorageError> {
        self.inner.fetch_pending_leaves(log_id, limit).await
    }

    async fn commit_batch(
        &self,
        log_id: i64,
        leaves: &[SequencedLeaf],
        state: &TreeState,
        head: &SignedTreeHead,
        expected_prior_revision: u64,
    ) -> Result<(), StorageError> {
        self.barrier.wait().await;
        self.inner
            .commit_batch(log_id, leaves, state, head, expected_prior_revision)
            .await
    }
}

/// Serves reads from `inner` but fails every commit with a datastore error.
pub struct FailingStorage {
    inner: Arc<LogDatastore>,
}

impl FailingStorage {
    pub fn new(inner: Arc<LogDatastore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LogStorage for FailingStorage {
    async fn read_tree_state(&self, log_id: i64) -> Result<Option<TreeState>, StorageError> {
        self.inner.read_tree_state(log_id).await
    }

    async fn read_current_tree_head(&self, log_id: i64) -> Result<Option<SignedTreeHead>, StorageError> {
        self.inner.read_current_tree_head(log_id).await
    }

    async fn fetch_pending_leaves(&self, log_id: i64, limit: usize) -> Result<Vec<PendingLeaf>, StorageError> {
        self.inner.fetch_pending_leaves(log_id, limit).await
    }

    async fn commit_batch(
        &self,
        _log_id: i64,
        _leaves: &[SequencedLeaf],
        _state: &TreeState,
        _head: &SignedTreeHead,
        _expected_prior_revision: u64,
    ) -> Result<(), StorageError> {
        Err(StorageError::Datastore(treehead_datastore::Error::Database(
            "disk unavailable".to_string(),
        )))
    }
}

pub struct RejectingSigner;

impl Signer for RejectingSigner {
    fn public_key_id(&self) -> String {
        "rejecting".to_string()
    }

    fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, SignerError> {
        Err(SignerError::Rejected("key disabled".to_string()))
    }
}
