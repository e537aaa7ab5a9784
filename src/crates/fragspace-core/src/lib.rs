//! # fragspace-core - Level-by-Level Combinatorial Graph Growth
//!
//! Starting from a set of root graphs, `fragspace-core` enumerates every
//! admissible way of attaching building blocks to their open attachment
//! points, one layer per level, up to a maximum depth. Every grown graph is
//! finished, optionally scored, and durably stored; the run can be resumed
//! after a crash, a timeout or a manual stop without redoing or dropping work.
//!
//! ## Components
//!
//! - [`CombinationIterator`] - deterministic, resumable, symmetry-aware
//!   enumeration of the combinations of one root
//! - [`CounterRegistry`] - atomic graph / vertex / candidate id sequences
//! - [`CandidateStore`] - one JSON file per candidate plus an index line, per level
//! - [`ExpansionTask`] - clone a root, apply one combination, finish, store, score
//! - [`TaskLedger`] - completed prefix of the submitted tasks
//! - [`WorkerPool`] - bounded queue with blocking backpressure
//! - [`Explorer`] - the level driver; owns the pool and the checkpoint protocol
//!
//! Collaborators live behind traits: [`BuildingBlockLibrary`],
//! [`GraphFinisher`] and [`Scorer`]. Checkpoints are stored through
//! [`fragspace_checkpoint::CheckpointSaver`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fragspace_core::{Explorer, ExplorerSettings, InMemoryLibrary};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = InMemoryLibrary::from_json_file("library.json").await?;
//!     let settings = ExplorerSettings {
//!         work_dir: "run".into(),
//!         workers: 4,
//!         max_level: 1,
//!         ..Default::default()
//!     };
//!
//!     let mut explorer = Explorer::new(settings, Arc::new(library))?;
//!     let summary = explorer.explore().await?;
//!     println!("{:?}", summary.candidates_per_level);
//!     Ok(())
//! }
//! ```

pub mod combination;
pub mod counters;
pub mod error;
pub mod explorer;
pub mod finishing;
pub mod graph;
pub mod ledger;
pub mod library;
pub mod pool;
pub mod scoring;
pub mod settings;
pub mod shutdown;
pub mod storage;
pub mod task;

pub use combination::{Assignment, Combination, CombinationIterator};
pub use counters::{CounterKind, CounterRegistry};
pub use error::{ExplorerError, Result};
pub use explorer::{read_root_graphs, ExplorationSummary, Explorer, Termination, SEED_LEVEL};
pub use finishing::{FinishOutcome, GraphFinisher, RuleBasedFinisher};
pub use graph::{ApRef, AttachmentPoint, BlockKind, BlockRef, Edge, Graph, RingClosure, Vertex, VertexIdx};
pub use ledger::{SafePoint, TaskLedger};
pub use library::{BuildingBlock, BuildingBlockLibrary, Choice, InMemoryLibrary, LibraryRules};
pub use pool::{Job, PoolShutdown, WorkerPool};
pub use scoring::{ExternalProcessScorer, ScoreReport, Scorer, ScoringRequest};
pub use settings::{ExplorerSettings, ScoringSettings};
pub use shutdown::ShutdownCoordinator;
pub use storage::{CandidateRecord, CandidateStore};
pub use task::{ExpansionContext, ExpansionTask, TaskReport};
