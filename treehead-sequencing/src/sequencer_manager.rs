use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use treehead_datastore::models::TreeType;
use treehead_datastore::LogDatastore;

use crate::error::{PassError, SequencingError};
use crate::hashers::hasher_for;
use crate::sequencer::{HeartbeatPolicy, Sequencer};
use crate::signer::SignerFactory;
use crate::storage::{AdminStorage, LogStorage, StorageError};
use crate::time_source::TimeSource;

#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub guard_window: Duration,
    pub heartbeat: HeartbeatPolicy,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            guard_window: Duration::from_secs(1),
            heartbeat: HeartbeatPolicy::Never,
        }
    }
}

/// Per-pass parameters chosen by whoever schedules passes.
#[derive(Clone)]
pub struct PassInfo {
    pub batch_size: usize,
    pub time_source: Arc<dyn TimeSource>,
}

/// The collaborators a pass resolves a log against.
#[derive(Clone)]
pub struct Registry {
    pub admin_storage: Arc<dyn AdminStorage>,
    pub log_storage: Arc<dyn LogStorage>,
    pub signer_factory: Arc<dyn SignerFactory>,
}

impl Registry {
    pub fn new(
        admin_storage: Arc<dyn AdminStorage>,
        log_storage: Arc<dyn LogStorage>,
        signer_factory: Arc<dyn SignerFactory>,
    ) -> Self {
        Self {
            admin_storage,
            log_storage,
            signer_factory,
        }
    }

    /// Admin and log storage both served by one datastore.
    pub fn with_datastore(datastore: Arc<LogDatastore>, signer_factory: Arc<dyn SignerFactory>) -> Self {
        Self::new(datastore.clone(), datastore, signer_factory)
    }
}

pub struct SequencerManager {
    registry: Registry,
    config: SequencerConfig,
}

impl SequencerManager {
    pub fn new(registry: Registry, config: SequencerConfig) -> Self {
        Self { registry, config }
    }

    pub fn name(&self) -> &'static str {
        "Sequencer"
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Runs exactly one sequencing pass for `log_id`.
    ///
    /// Failures are returned tagged with the log id and are never retried
    /// here; calling again on a later tick is the retry.
    pub async fn execute_pass(
        &self,
        cancel: &CancellationToken,
        log_id: i64,
        info: &PassInfo,
    ) -> Result<usize, PassError> {
        self.run_pass(cancel, log_id, info)
            .await
            .map_err(|e| PassError::new(log_id, e))
    }

    async fn run_pass(
        &self,
        cancel: &CancellationToken,
        log_id: i64,
        info: &PassInfo,
    ) -> Result<usize, SequencingError> {
        let tree = self
            .registry
            .admin_storage
            .resolve_log_config(log_id, TreeType::Log)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) | StorageError::WrongType { .. } | StorageError::Frozen(_) => {
                    SequencingError::TreeResolution(e)
                }
                // an unreachable admin store is an I/O failure, retried on a later pass
                other => SequencingError::from(other),
            })?;
        let hasher = hasher_for(&tree)?;
        let signer = self
            .registry
            .signer_factory
            .signer_for(&tree)
            .await
            .map_err(SequencingError::SignerUnavailable)?;

        let mut sequencer = Sequencer::new(
            hasher,
            info.time_source.clone(),
            self.registry.log_storage.clone(),
            signer,
        );
        sequencer.set_guard_window(self.config.guard_window);
        sequencer.set_heartbeat_policy(self.config.heartbeat);

        sequencer.sequence_batch(cancel, log_id, info.batch_size).await
    }
}
