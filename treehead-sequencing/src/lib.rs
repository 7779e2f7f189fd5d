//! Sequencing core of a verifiable log.
//!
//! A [`SequencerManager`] resolves one log's tree, hasher and signer and runs
//! a single bounded pass of the [`Sequencer`], which moves eligible pending
//! leaves into the Merkle tree and commits a freshly signed tree head.

pub mod error;
pub mod hashers;
pub mod merkle;
pub mod sequencer;
pub mod sequencer_manager;
pub mod signer;
pub mod storage;
pub mod time_source;

pub use error::{ErrorKind, PassError, Result, SequencingError};
pub use sequencer::{HeartbeatPolicy, Sequencer};
pub use sequencer_manager::{PassInfo, Registry, SequencerConfig, SequencerManager};
