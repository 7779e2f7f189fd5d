mod common;

use async_trait::async_trait;
use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use treehead_datastore::models::{PendingLeaf, SequencedLeaf, SignedTreeHead, TreeState};
use treehead_datastore::Model;
use treehead_sequencing::storage::{LogStorage, StorageError};
use treehead_sequencing::{ErrorKind, HeartbeatPolicy};

#[tokio::test]
async fn test_guard_window_scenario() {
    let env = TestEnv::new().await;
    let mut hashes = env.seed_tree(5, 3, secs(60)).await;

    let oldest = env.queue_leaf(b"ten seconds old", secs(10)).await;
    env.queue_leaf(b"three seconds old", secs(3)).await;
    env.queue_leaf(b"one second old", secs(1)).await;

    let sequencer = env.sequencer(Duration::from_secs(5));
    let count = sequencer
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let leaf = SequencedLeaf::find_by_index(&env.datastore, LOG_ID, 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(leaf.queue_id, oldest.queue_id);
    assert_eq!(leaf.integrate_timestamp_nanos, nanos_of(env.now()));

    let head = env.current_head().await.unwrap();
    assert_eq!(head.tree_size, 6);
    assert_eq!(head.revision, 4);
    assert_eq!(head.timestamp_nanos, nanos_of(env.now()));
    hashes.push(oldest.leaf_hash_bytes().unwrap());
    assert_eq!(head.root_hash_bytes().unwrap(), env.reference_root(&hashes));
    assert!(head.verify(&env.keypair.public_only()).unwrap());

    // the previous head stays in history
    let previous = SignedTreeHead::find_by_revision(&env.datastore, LOG_ID, 3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(previous.tree_size, 5);

    assert_eq!(env.tree_state().await.unwrap().size, 6);
    assert_eq!(env.pending_count().await, 2);
}

#[tokio::test]
async fn test_empty_queue_writes_nothing() {
    let env = TestEnv::new().await;
    env.seed_tree(3, 2, secs(60)).await;
    let head_before = env.current_head().await;
    let state_before = env.tree_state().await;

    let count = env
        .sequencer(Duration::from_secs(1))
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(env.current_head().await, head_before);
    assert_eq!(env.tree_state().await, state_before);
    assert_eq!(
        SignedTreeHead::find_max_revision(&env.datastore, LOG_ID).await.unwrap(),
        Some(2)
    );
}

#[tokio::test]
async fn test_empty_log_with_no_work_stays_empty() {
    let env = TestEnv::new().await;
    let count = env
        .sequencer(Duration::ZERO)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert!(env.current_head().await.is_none());
    assert!(env.tree_state().await.is_none());
}

#[tokio::test]
async fn test_guard_window_boundary() {
    let env = TestEnv::new().await;
    let guard_window = Duration::from_secs(5);
    let epsilon = chrono::Duration::milliseconds(1);

    let too_fresh = env.queue_leaf(b"fresh", epsilon).await;
    let old_enough = env.queue_leaf(b"old", secs(5) + epsilon).await;
    let exactly_at_cutoff = env.queue_leaf(b"cutoff", secs(5)).await;

    let count = env
        .sequencer(guard_window)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let queue_ids: Vec<String> = env.sequenced().await.into_iter().map(|l| l.queue_id).collect();
    assert_eq!(queue_ids, vec![old_enough.queue_id, exactly_at_cutoff.queue_id]);

    let remaining = PendingLeaf::find_oldest(&env.datastore, LOG_ID, 10).await.unwrap();
    assert_eq!(remaining, vec![too_fresh]);
}

#[tokio::test]
async fn test_guard_window_excluding_everything_is_success() {
    let env = TestEnv::new().await;
    env.seed_tree(2, 1, secs(60)).await;
    env.queue_leaf(b"a", secs(1)).await;
    env.queue_leaf(b"b", secs(2)).await;

    let count = env
        .sequencer(Duration::from_secs(30))
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(env.current_head().await.unwrap().revision, 1);
    assert_eq!(env.pending_count().await, 2);
}

#[tokio::test]
async fn test_signer_failure_persists_nothing() {
    let env = TestEnv::new().await;
    env.seed_tree(4, 2, secs(60)).await;
    env.queue_leaf(b"a", secs(10)).await;
    let head_before = env.current_head().await;

    let sequencer = env.sequencer_with(env.datastore.clone(), Arc::new(RejectingSigner), Duration::ZERO);
    let err = sequencer
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Signing);
    assert!(!err.is_retryable());

    assert_eq!(env.current_head().await, head_before);
    assert_eq!(env.tree_state().await.unwrap().size, 4);
    assert_eq!(env.sequenced().await.len(), 4);
    assert_eq!(env.pending_count().await, 1);
}

#[tokio::test]
async fn test_storage_failure_persists_nothing() {
    let env = TestEnv::new().await;
    env.seed_tree(4, 2, secs(60)).await;
    env.queue_leaf(b"a", secs(10)).await;
    let head_before = env.current_head().await;
    let state_before = env.tree_state().await;

    let storage = Arc::new(FailingStorage::new(env.datastore.clone()));
    let sequencer = env.sequencer_with(storage, Arc::new(env.keypair.clone()), Duration::ZERO);
    let err = sequencer
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.is_retryable());

    assert_eq!(env.current_head().await, head_before);
    assert_eq!(env.tree_state().await, state_before);
    assert_eq!(env.sequenced().await.len(), 4);
    assert_eq!(env.pending_count().await, 1);
}

#[tokio::test]
async fn test_zero_batch_size_is_invalid() {
    let env = TestEnv::new().await;
    env.queue_leaf(b"a", secs(10)).await;

    let err = env
        .sequencer(Duration::ZERO)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(env.pending_count().await, 1);
}

#[tokio::test]
async fn test_batch_size_takes_oldest_first() {
    let env = TestEnv::new().await;
    let mut queued = Vec::new();
    for age in [6, 10, 8, 7, 9] {
        queued.push(env.queue_leaf(format!("leaf aged {}", age).as_bytes(), secs(age)).await);
    }

    let count = env
        .sequencer(Duration::ZERO)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 2)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let sequenced = env.sequenced().await;
    assert_eq!(sequenced[0].queue_id, queued[1].queue_id);
    assert_eq!(sequenced[1].queue_id, queued[4].queue_id);
    assert_eq!(env.pending_count().await, 3);
}

#[tokio::test]
async fn test_root_independent_of_pass_count() {
    let many_passes = TestEnv::new().await;
    let one_pass = TestEnv::new().await;
    for i in 0..10 {
        let data = format!("entry-{}", i);
        // same queue order in both logs
        let ts = nanos_of(many_passes.now()) - 60_000_000_000 + i;
        many_passes.queue_leaf_at(data.as_bytes(), ts).await;
        one_pass.queue_leaf_at(data.as_bytes(), ts).await;
    }

    let sequencer = many_passes.sequencer(Duration::ZERO);
    let mut total = 0;
    while total < 10 {
        many_passes.clock.advance(secs(1));
        total += sequencer
            .sequence_batch(&CancellationToken::new(), LOG_ID, 3)
            .await
            .unwrap();
    }
    one_pass
        .sequencer(Duration::ZERO)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();

    let head_a = many_passes.current_head().await.unwrap();
    let head_b = one_pass.current_head().await.unwrap();
    assert_eq!(head_a.revision, 4);
    assert_eq!(head_b.revision, 1);
    assert_eq!(head_a.tree_size, 10);
    assert_eq!(head_a.root_hash, head_b.root_hash);
    assert_eq!(
        head_a.root_hash_bytes().unwrap(),
        many_passes.reference_root(&many_passes.sequenced_hashes().await)
    );
}

#[tokio::test]
async fn test_sequence_numbers_are_contiguous() {
    let env = TestEnv::new().await;
    let sequencer = env.sequencer(Duration::ZERO);
    let mut previous_revision = 0;

    for round in 0..5 {
        for i in 0..=round {
            env.queue_leaf(format!("{}-{}", round, i).as_bytes(), secs(1)).await;
        }
        env.clock.advance(secs(1));
        sequencer
            .sequence_batch(&CancellationToken::new(), LOG_ID, 4)
            .await
            .unwrap();

        let head = env.current_head().await.unwrap();
        assert!(head.revision > previous_revision);
        previous_revision = head.revision;

        let indexes: Vec<u64> = env.sequenced().await.iter().map(|l| l.leaf_index).collect();
        assert_eq!(indexes, (0..head.tree_size).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_duplicate_leaf_hashes_are_both_sequenced() {
    let env = TestEnv::new().await;
    env.queue_leaf(b"same", secs(5)).await;
    env.queue_leaf(b"same", secs(5)).await;

    let count = env
        .sequencer(Duration::ZERO)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let hashes = env.sequenced_hashes().await;
    assert_eq!(hashes.len(), 2);
    assert_eq!(hashes[0], hashes[1]);
    assert_eq!(env.current_head().await.unwrap().tree_size, 2);
}

#[tokio::test]
async fn test_concurrent_passes_conflict() {
    let env = TestEnv::new().await;
    env.seed_tree(1, 1, secs(60)).await;
    for i in 0..3 {
        env.queue_leaf(format!("leaf-{}", i).as_bytes(), secs(10)).await;
    }

    let storage = Arc::new(BarrierStorage::new(env.datastore.clone(), 2));
    let first = env.sequencer_with(storage.clone(), Arc::new(env.keypair.clone()), Duration::ZERO);
    let second = env.sequencer_with(storage, Arc::new(env.keypair.clone()), Duration::ZERO);

    let cancel = CancellationToken::new();
    let (a, b) = tokio::join!(
        first.sequence_batch(&cancel, LOG_ID, 10),
        second.sequence_batch(&cancel, LOG_ID, 10)
    );

    let (ok, err) = match (a, b) {
        (Ok(n), Err(e)) | (Err(e), Ok(n)) => (n, e),
        other => panic!("expected one success and one conflict, got {:?}", other),
    };
    assert_eq!(ok, 3);
    assert_eq!(err.kind(), ErrorKind::SequencingConflict);
    assert!(err.is_retryable());

    let head = env.current_head().await.unwrap();
    assert_eq!(head.revision, 2);
    assert_eq!(head.tree_size, 4);
    assert_eq!(env.tree_state().await.unwrap().size, 4);
    assert_eq!(env.sequenced().await.len(), 4);
    assert_eq!(env.pending_count().await, 0);
    assert_eq!(
        head.root_hash_bytes().unwrap(),
        env.reference_root(&env.sequenced_hashes().await)
    );
}

/// Cancels the pass while it is reading the pending queue.
struct CancelOnFetch {
    inner: Arc<treehead_datastore::LogDatastore>,
    cancel: CancellationToken,
}

#[async_trait]
impl LogStorage for CancelOnFetch {
    async fn read_tree_state(&self, log_id: i64) -> Result<Option<TreeState>, StorageError> {
        self.inner.read_tree_state(log_id).await
    }

    async fn read_current_tree_head(&self, log_id: i64) -> Result<Option<SignedTreeHead>, StorageError> {
        self.inner.read_current_tree_head(log_id).await
    }

    async fn fetch_pending_leaves(&self, log_id: i64, limit: usize) -> Result<Vec<PendingLeaf>, StorageError> {
        self.cancel.cancel();
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
        self.inner
            .commit_batch(log_id, leaves, state, head, expected_prior_revision)
            .await
    }
}

#[tokio::test]
async fn test_cancellation_leaves_no_effect() {
    let env = TestEnv::new().await;
    env.seed_tree(2, 1, secs(60)).await;
    env.queue_leaf(b"a", secs(10)).await;
    let head_before = env.current_head().await;

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = env
        .sequencer(Duration::ZERO)
        .sequence_batch(&cancelled, LOG_ID, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let cancel = CancellationToken::new();
    let storage = Arc::new(CancelOnFetch {
        inner: env.datastore.clone(),
        cancel: cancel.clone(),
    });
    let err = env
        .sequencer_with(storage, Arc::new(env.keypair.clone()), Duration::ZERO)
        .sequence_batch(&cancel, LOG_ID, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    assert_eq!(env.current_head().await, head_before);
    assert_eq!(env.sequenced().await.len(), 2);
    assert_eq!(env.pending_count().await, 1);
}

#[tokio::test]
async fn test_heartbeat_when_head_is_stale() {
    let env = TestEnv::new().await;
    env.seed_tree(3, 5, secs(120)).await;
    let stale = env.current_head().await.unwrap();

    let mut sequencer = env.sequencer(Duration::ZERO);
    sequencer.set_heartbeat_policy(HeartbeatPolicy::MaxRootAge(Duration::from_secs(60)));
    let count = sequencer
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();
    assert_eq!(count, 0);

    let head = env.current_head().await.unwrap();
    assert_eq!(head.revision, 6);
    assert_eq!(head.tree_size, stale.tree_size);
    assert_eq!(head.root_hash, stale.root_hash);
    assert_eq!(head.timestamp_nanos, nanos_of(env.now()));
    assert!(head.verify(&env.keypair).unwrap());

    // now fresh, so the next pass is a no-op again
    env.clock.advance(secs(10));
    sequencer
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();
    assert_eq!(env.current_head().await.unwrap().revision, 6);
}

#[tokio::test]
async fn test_heartbeat_signs_empty_log() {
    let env = TestEnv::new().await;
    let mut sequencer = env.sequencer(Duration::ZERO);
    sequencer.set_heartbeat_policy(HeartbeatPolicy::MaxRootAge(Duration::from_secs(60)));
    sequencer
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap();

    let head = env.current_head().await.unwrap();
    assert_eq!(head.revision, 1);
    assert_eq!(head.tree_size, 0);
    assert_eq!(head.root_hash_bytes().unwrap(), env.hasher.empty_root());
    assert_eq!(env.tree_state().await.unwrap().size, 0);
}

#[tokio::test]
async fn test_timestamp_regression_is_refused() {
    let env = TestEnv::new().await;
    // previous head signed one second in the future
    env.seed_tree(2, 1, secs(-1)).await;
    env.queue_leaf(b"a", secs(10)).await;

    let err = env
        .sequencer(Duration::ZERO)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimestampRegression);
    assert_eq!(env.current_head().await.unwrap().revision, 1);
    assert_eq!(env.pending_count().await, 1);
}

#[tokio::test]
async fn test_inconsistent_tree_state_is_refused() {
    let env = TestEnv::new().await;
    env.seed_tree(3, 1, secs(60)).await;
    env.queue_leaf(b"a", secs(10)).await;

    let mut state = env.tree_state().await.unwrap();
    state.frontier.reverse();
    state.save(&env.datastore).await.unwrap();

    let err = env
        .sequencer(Duration::ZERO)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InconsistentState);

    // a head without any tree state
    state.delete(&env.datastore).await.unwrap();
    let err = env
        .sequencer(Duration::ZERO)
        .sequence_batch(&CancellationToken::new(), LOG_ID, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InconsistentState);
    assert_eq!(env.pending_count().await, 1);
    assert_eq!(env.current_head().await.unwrap().revision, 1);
}
