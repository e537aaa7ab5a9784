//! # fragspace-checkpoint - Resumable Exploration Snapshots
//!
//! Checkpoints let a combinatorial exploration be interrupted (crash, timeout,
//! manual stop) and resumed later without redoing or silently dropping work.
//!
//! ## Core Concepts
//!
//! - [`Checkpoint`] - level, owning root, next enumeration cursor, last safely
//!   completed candidate id and a [`CounterSnapshot`] for reseeding id counters
//! - [`CheckpointSaver`] - where snapshots live; `put()` overwrites, `get()`
//!   returns the latest
//! - [`FileCheckpointSaver`] - atomic single-file storage
//! - [`InMemoryCheckpointSaver`] - for tests and dry runs
//! - [`SerializerProtocol`] - JSON (default) or bincode encoding
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fragspace_checkpoint::{
//!     Checkpoint, CheckpointFormat, CheckpointSaver, CounterSnapshot, FileCheckpointSaver,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = FileCheckpointSaver::new("run/fragspace.chk", CheckpointFormat::Json);
//!
//!     let counters = CounterSnapshot { graph: 12, vertex: 40, candidate: 0 };
//!     saver.put(&Checkpoint::new(0, 1, 11, vec![1, 0], counters)).await?;
//!
//!     if let Some(chk) = saver.get().await? {
//!         println!("resume from {}", chk);
//!     }
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod error;
pub mod file;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use checkpoint::{Checkpoint, CounterSnapshot, CHECKPOINT_VERSION};
pub use error::{CheckpointError, Result};
pub use file::FileCheckpointSaver;
pub use memory::InMemoryCheckpointSaver;
pub use serializer::{AnySerializer, BincodeSerializer, CheckpointFormat, JsonSerializer, SerializerProtocol};
pub use traits::CheckpointSaver;
