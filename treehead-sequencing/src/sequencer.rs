use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use treehead_datastore::models::{PendingLeaf, SequencedLeaf, SignedTreeHead, TreeState};

use crate::error::{Result, SequencingError};
use crate::hashers::HashFunction;
use crate::merkle::CompactRange;
use crate::signer::Signer;
use crate::storage::LogStorage;
use crate::time_source::TimeSource;

/// Whether a pass that finds nothing to sequence still signs a fresh head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeartbeatPolicy {
    #[default]
    Never,
    /// Re-sign the unchanged tree once the current head is at least this old,
    /// or when the log has no head at all.
    MaxRootAge(Duration),
}

impl HeartbeatPolicy {
    fn is_due(&self, current: Option<&SignedTreeHead>, now_nanos: i64) -> bool {
        match (self, current) {
            (Self::Never, _) => false,
            (Self::MaxRootAge(_), None) => true,
            (Self::MaxRootAge(max_age), Some(head)) => {
                let max_age = i64::try_from(max_age.as_nanos()).unwrap_or(i64::MAX);
                now_nanos.saturating_sub(head.timestamp_nanos) >= max_age
            }
        }
    }
}

/// Sequences one log: orders its eligible pending leaves, extends the tree
/// and commits a newly signed head.
pub struct Sequencer {
    hasher: Arc<dyn HashFunction>,
    time_source: Arc<dyn TimeSource>,
    log_storage: Arc<dyn LogStorage>,
    signer: Arc<dyn Signer>,
    guard_window: Duration,
    heartbeat: HeartbeatPolicy,
}

impl Sequencer {
    pub fn new(
        hasher: Arc<dyn HashFunction>,
        time_source: Arc<dyn TimeSource>,
        log_storage: Arc<dyn LogStorage>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            hasher,
            time_source,
            log_storage,
            signer,
            guard_window: Duration::ZERO,
            heartbeat: HeartbeatPolicy::Never,
        }
    }

    /// Pending leaves younger than `guard_window` are left for a later pass.
    pub fn set_guard_window(&mut self, guard_window: Duration) {
        self.guard_window = guard_window;
    }

    pub fn set_heartbeat_policy(&mut self, heartbeat: HeartbeatPolicy) {
        self.heartbeat = heartbeat;
    }

    /// Runs one pass over at most `max_batch_size` pending leaves of `log_id`
    /// and returns how many were sequenced.
    ///
    /// Either everything the pass produced is committed or nothing is.
    pub async fn sequence_batch(
        &self,
        cancel: &CancellationToken,
        log_id: i64,
        max_batch_size: usize,
    ) -> Result<usize> {
        if max_batch_size == 0 {
            return Err(SequencingError::InvalidArgument(format!(
                "max batch size for log {} must be positive",
                log_id
            )));
        }

        let now = self.time_source.now();
        let now_nanos = nanos(now)?;

        check_cancelled(cancel)?;
        let current_head = self.log_storage.read_current_tree_head(log_id).await?;
        check_cancelled(cancel)?;
        let state = self.log_storage.read_tree_state(log_id).await?;
        let mut range = self.load_range(log_id, state.as_ref(), current_head.as_ref())?;
        let prior_revision = current_head.as_ref().map_or(0, |h| h.revision);

        check_cancelled(cancel)?;
        let fetched = self
            .log_storage
            .fetch_pending_leaves(log_id, max_batch_size)
            .await?;
        let fetched_count = fetched.len();

        let guard_window = i64::try_from(self.guard_window.as_nanos()).unwrap_or(i64::MAX);
        let cutoff = now_nanos.saturating_sub(guard_window);
        let eligible: Vec<PendingLeaf> = fetched
            .into_iter()
            .filter(|leaf| leaf.queue_timestamp_nanos <= cutoff)
            .collect();
        if eligible.len() < fetched_count {
            log::debug!(
                "log {}: guard window held back {} of {} pending leaves",
                log_id,
                fetched_count - eligible.len(),
                fetched_count
            );
        }

        let mut leaves = Vec::with_capacity(eligible.len());
        for pending in eligible {
            let leaf_hash = pending
                .leaf_hash_bytes()
                .map_err(|e| SequencingError::InconsistentState(e.to_string()))?;
            if leaf_hash.len() != self.hasher.size() {
                return Err(SequencingError::InconsistentState(format!(
                    "log {}: pending leaf {} has a {} byte hash, {} expects {}",
                    log_id,
                    pending.queue_id,
                    leaf_hash.len(),
                    self.hasher.name(),
                    self.hasher.size()
                )));
            }
            let leaf_index = range.size();
            range.append(self.hasher.as_ref(), leaf_hash);
            leaves.push(SequencedLeaf::from_pending(pending, leaf_index, now_nanos));
        }

        if leaves.is_empty() && !self.heartbeat.is_due(current_head.as_ref(), now_nanos) {
            log::debug!("log {}: nothing to sequence", log_id);
            return Ok(0);
        }

        if let Some(previous) = &current_head {
            if now_nanos <= previous.timestamp_nanos {
                return Err(SequencingError::TimestampRegression {
                    previous: previous.timestamp_nanos,
                    now: now_nanos,
                });
            }
        }

        let root = range.root(self.hasher.as_ref());
        let mut head = SignedTreeHead::new(log_id, range.size(), &root, now_nanos, prior_revision + 1);
        let signature = self
            .signer
            .sign(&head.canonical_bytes())
            .map_err(SequencingError::Signing)?;
        head.set_signature(&signature);

        check_cancelled(cancel)?;
        let committed = self
            .log_storage
            .commit_batch(log_id, &leaves, &range.to_state(log_id), &head, prior_revision)
            .await;
        if let Err(e) = committed {
            let err = SequencingError::from(e);
            log::warn!("log {}: commit of revision {} failed: {}", log_id, head.revision, err);
            return Err(err);
        }

        log::info!(
            "log {}: sequenced {} leaves, tree size {} at revision {}, root {}",
            log_id,
            leaves.len(),
            head.tree_size,
            head.revision,
            head.root_hash
        );
        Ok(leaves.len())
    }

    /// The persisted tree, checked against the head that claims to cover it.
    fn load_range(
        &self,
        log_id: i64,
        state: Option<&TreeState>,
        head: Option<&SignedTreeHead>,
    ) -> Result<CompactRange> {
        let (state, head) = match (state, head) {
            (None, None) => return Ok(CompactRange::new()),
            (Some(state), Some(head)) => (state, head),
            (state, head) => {
                let err = SequencingError::InconsistentState(format!(
                    "log {}: tree state present: {}, tree head present: {}",
                    log_id,
                    state.is_some(),
                    head.is_some()
                ));
                log::warn!("{}", err);
                return Err(err);
            }
        };

        let range = CompactRange::from_state(state, self.hasher.as_ref())?;
        let root = range.root(self.hasher.as_ref());
        let head_root = head
            .root_hash_bytes()
            .map_err(|e| SequencingError::InconsistentState(e.to_string()))?;
        if range.size() != head.tree_size || root != head_root {
            let err = SequencingError::InconsistentState(format!(
                "log {}: tree state has size {} root {}, head {} has size {} root {}",
                log_id,
                range.size(),
                hex::encode(&root),
                head.revision,
                head.tree_size,
                head.root_hash
            ));
            log::warn!("{}", err);
            return Err(err);
        }
        Ok(range)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SequencingError::Cancelled);
    }
    Ok(())
}

fn nanos(time: DateTime<Utc>) -> Result<i64> {
    time.timestamp_nanos_opt()
        .ok_or_else(|| SequencingError::InvalidArgument(format!("time {} is out of range", time)))
}
