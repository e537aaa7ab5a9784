//! Checkpoint data structure for resumable exploration
//!
//! A [`Checkpoint`] is a snapshot of exploration progress that is sufficient to
//! resume a run exactly where the last *safely completed* expansion left off:
//!
//! - which level and root graph to resume ([`Checkpoint::level`], [`Checkpoint::root_id`])
//! - where to restart the enumeration of that root ([`Checkpoint::next_cursor`])
//! - which persisted candidates can be trusted ([`Checkpoint::last_safe_graph_id`])
//! - how to reseed the id counters so fresh ids never collide with stored ones
//!   ([`Checkpoint::counters`])
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Checkpoint                                   │
//! │  • level: 1                                  │
//! │  • root_id: 7            (owning root graph) │
//! │  • next_cursor: [2, 0, 1]                    │
//! │  • last_safe_graph_id: 31                    │
//! │  • counters: {graph: 33, vertex: 90, ...}    │
//! └──────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Snapshot of the process-wide id sequences
///
/// Each value is the last id handed out for that sequence (0 when none has
/// been issued yet).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Graph (and candidate file) ids
    pub graph: u64,
    /// Vertex ids
    pub vertex: u64,
    /// Sequence used to name candidates handed to the scoring collaborator
    pub candidate: u64,
}

/// Resumable snapshot of exploration progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version
    pub version: u32,

    /// When the snapshot was captured
    pub created_at: DateTime<Utc>,

    /// Level being explored when the snapshot was taken (-1 for seeding)
    pub level: i32,

    /// Largest candidate id produced by the completed prefix of submitted work
    pub last_safe_graph_id: Option<u64>,

    /// Root graph whose enumeration the snapshot points into
    pub root_id: Option<u64>,

    /// Enumeration cursor of the next combination to expand for `root_id`
    pub next_cursor: Vec<usize>,

    /// Counter values to reseed the registry with
    pub counters: CounterSnapshot,
}

impl Checkpoint {
    /// A checkpoint that records no progress at all
    pub fn fresh() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            created_at: Utc::now(),
            level: -1,
            last_safe_graph_id: None,
            root_id: None,
            next_cursor: Vec::new(),
            counters: CounterSnapshot::default(),
        }
    }

    /// Create a checkpoint for a safely completed expansion
    pub fn new(
        level: i32,
        root_id: u64,
        last_safe_graph_id: u64,
        next_cursor: Vec<usize>,
        counters: CounterSnapshot,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            created_at: Utc::now(),
            level,
            last_safe_graph_id: Some(last_safe_graph_id),
            root_id: Some(root_id),
            next_cursor,
            counters,
        }
    }

    /// True when the snapshot does not point into any root enumeration
    pub fn is_fresh(&self) -> bool {
        self.root_id.is_none()
    }

    /// Whether a root graph of the checkpoint level was fully handled before
    /// the snapshot was taken
    ///
    /// Roots are explored in ascending id order, so every root with a smaller
    /// id than the checkpoint root has been completely enumerated.
    pub fn root_already_used(&self, root_id: u64) -> bool {
        match self.root_id {
            Some(chk_root) => root_id < chk_root,
            None => false,
        }
    }

    /// Whether a stored candidate can be trusted after a restart
    ///
    /// `root_id` and `cursor` are the lineage recorded with the candidate at
    /// the checkpoint level. A candidate is safe only when its id does not
    /// exceed [`last_safe_graph_id`](Self::last_safe_graph_id) and its lineage
    /// lies inside the completed prefix of the enumeration.
    pub fn is_candidate_safe(&self, graph_id: u64, root_id: u64, cursor: &[usize]) -> bool {
        let Some(last_safe) = self.last_safe_graph_id else {
            return false;
        };
        if graph_id > last_safe {
            return false;
        }
        match self.root_id {
            Some(chk_root) if root_id == chk_root => cursor <= self.next_cursor.as_slice(),
            Some(chk_root) => root_id < chk_root,
            None => false,
        }
    }

    /// Check internal consistency of a restored checkpoint
    pub fn validate(&self) -> crate::Result<()> {
        if self.version != CHECKPOINT_VERSION {
            return Err(crate::CheckpointError::Invalid(format!(
                "unsupported checkpoint version {} (expected {})",
                self.version, CHECKPOINT_VERSION
            )));
        }
        if self.level < -1 {
            return Err(crate::CheckpointError::Invalid(format!(
                "level {} is below the seed level",
                self.level
            )));
        }
        if let Some(last_safe) = self.last_safe_graph_id {
            if last_safe > self.counters.graph {
                return Err(crate::CheckpointError::Invalid(format!(
                    "last safe graph id {} exceeds graph counter {}",
                    last_safe, self.counters.graph
                )));
            }
        }
        if self.root_id.is_some() && self.last_safe_graph_id.is_none() {
            return Err(crate::CheckpointError::Invalid(
                "root id recorded without a last safe graph id".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::fresh()
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Checkpoint[level={}, root={}, lastSafeGraph={}, nextCursor={:?}, \
             counters(graph={}, vertex={}, candidate={})]",
            self.level,
            self.root_id.map_or("-".to_string(), |id| id.to_string()),
            self.last_safe_graph_id.map_or("-".to_string(), |id| id.to_string()),
            self.next_cursor,
            self.counters.graph,
            self.counters.vertex,
            self.counters.candidate,
        )
    }
}
