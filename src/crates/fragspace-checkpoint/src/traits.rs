//! Checkpoint persistence trait
//!
//! [`CheckpointSaver`] is the seam between the exploration driver and wherever
//! checkpoints end up. The driver only ever needs the most recent snapshot, so
//! the contract is a single overwriting slot:
//!
//! - **`put()`** - persist a snapshot, replacing the previous one
//! - **`get()`** - read the latest snapshot, if any
//!
//! Implementations must make `put()` atomic: a reader never observes a
//! half-written checkpoint, even if the process dies in the middle of a write.

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use async_trait::async_trait;

/// Storage backend for exploration checkpoints
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Persist `checkpoint`, replacing any previously stored snapshot
    async fn put(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Load the latest snapshot, or `None` when nothing was stored yet
    async fn get(&self) -> Result<Option<Checkpoint>>;

    /// Human-readable location of the stored checkpoint
    fn location(&self) -> String;
}
