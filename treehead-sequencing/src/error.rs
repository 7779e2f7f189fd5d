use thiserror::Error;
use treehead_datastore::models::HashStrategy;

use crate::signer::SignerError;
use crate::storage::StorageError;

/// Every way a sequencing pass can fail. A failed pass never leaves a
/// partial commit behind, whatever the variant.
#[derive(Debug, Error)]
pub enum SequencingError {
    #[error("tree resolution failed: {0}")]
    TreeResolution(#[source] StorageError),

    #[error("no hasher available for strategy {0:?}")]
    HasherUnavailable(HashStrategy),

    #[error("signer unavailable: {0}")]
    SignerUnavailable(#[source] SignerError),

    #[error("concurrent sequencing pass committed first: {0}")]
    SequencingConflict(String),

    #[error("signing tree head failed: {0}")]
    Signing(#[source] SignerError),

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("tree state does not match the current tree head: {0}")]
    InconsistentState(String),

    #[error("refusing to sign tree head at {now} ns, previous head is at {previous} ns")]
    TimestampRegression { previous: i64, now: i64 },

    #[error("sequencing pass cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TreeResolution,
    HasherUnavailable,
    SignerUnavailable,
    SequencingConflict,
    Signing,
    Io,
    InvalidArgument,
    InconsistentState,
    TimestampRegression,
    Cancelled,
}

impl SequencingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TreeResolution(_) => ErrorKind::TreeResolution,
            Self::HasherUnavailable(_) => ErrorKind::HasherUnavailable,
            Self::SignerUnavailable(_) => ErrorKind::SignerUnavailable,
            Self::SequencingConflict(_) => ErrorKind::SequencingConflict,
            Self::Signing(_) => ErrorKind::Signing,
            Self::Storage(_) => ErrorKind::Io,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InconsistentState(_) => ErrorKind::InconsistentState,
            Self::TimestampRegression { .. } => ErrorKind::TimestampRegression,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether re-running the whole pass later may succeed. Nothing in this
    /// crate retries; the scheduler that invokes passes decides.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::HasherUnavailable
                | ErrorKind::SignerUnavailable
                | ErrorKind::SequencingConflict
                | ErrorKind::Io
                | ErrorKind::TimestampRegression
                | ErrorKind::Cancelled
        )
    }
}

impl From<StorageError> for SequencingError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(reason) => Self::SequencingConflict(reason),
            other => Self::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SequencingError>;

/// A pass failure tagged with the log it happened on.
#[derive(Debug, Error)]
#[error("sequencing log {log_id}: {source}")]
pub struct PassError {
    pub log_id: i64,
    #[source]
    pub source: SequencingError,
}

impl PassError {
    pub fn new(log_id: i64, source: SequencingError) -> Self {
        Self { log_id, source }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
