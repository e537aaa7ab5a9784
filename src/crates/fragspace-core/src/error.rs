//! Error types for the exploration engine
//!
//! Every error in this crate is fatal for the run: nothing below the level
//! driver retries or recovers silently. Errors bubble up to the driver's
//! control loop, which stops the worker pool and returns them to the caller.
//! Whatever was durably stored up to the last checkpoint stays resumable.
//!
//! # Error Hierarchy
//!
//! ```text
//! ExplorerError
//! ├── Enumeration     - bad resume cursor, malformed combination
//! ├── Expansion       - an expansion task failed (wraps the cause)
//! ├── Consistency     - stored candidates != reported candidates
//! ├── Timeout         - a level exceeded its wall-clock budget
//! ├── Scoring         - external scoring process exited non-zero
//! ├── Interrupted     - manual stop requested
//! ├── Library/Graph   - collaborator or graph-model errors
//! ├── Storage         - candidate store layout problems
//! ├── Configuration   - invalid settings
//! ├── PoolClosed      - submission after pool shutdown
//! └── Checkpoint/Io/Serialization - wrapped lower-level errors
//! ```

use fragspace_checkpoint::CheckpointError;
use thiserror::Error;

/// Result type for exploration operations
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Errors raised while exploring the combinatorial space
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// The combination iterator was misused or given an invalid cursor
    ///
    /// Raised before any graph is mutated.
    #[error("Enumeration error: {0}")]
    Enumeration(String),

    /// An expansion task failed
    ///
    /// Carries the lineage of the failing combination so the operator can
    /// tell exactly which task broke the run.
    #[error(
        "Expansion task {task_id} (level {level}, root {root_id}, cursor {cursor:?}) failed: {source}"
    )]
    Expansion {
        /// Task identifier
        task_id: u64,
        /// Level the task belongs to
        level: i32,
        /// Root graph the combination was applied to
        root_id: u64,
        /// Enumeration cursor of the failing combination
        cursor: Vec<usize>,
        /// What went wrong
        #[source]
        source: Box<ExplorerError>,
    },

    /// Stored candidates do not match what the tasks reported
    #[error("Consistency error at level {level}: expected {expected} stored candidates, found {stored}")]
    Consistency {
        level: i32,
        expected: usize,
        stored: usize,
    },

    /// A level did not complete within its wall-clock budget
    #[error("Level {level} timed out after {waited_secs} seconds")]
    Timeout { level: i32, waited_secs: u64 },

    /// The external scoring collaborator failed
    #[error("Scoring of candidate {graph_id} in task {task_id} failed (exit code {exit_code:?}): {stderr}")]
    Scoring {
        task_id: u64,
        graph_id: u64,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Manual stop (signal) requested while exploring
    #[error("Exploration interrupted during level {level}")]
    Interrupted { level: i32 },

    /// Building-block library inconsistency
    #[error("Library error: {0}")]
    Library(String),

    /// Graph construction or lookup error
    #[error("Graph error: {0}")]
    Graph(String),

    /// Candidate storage layout error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Work was submitted to a pool that has shut down
    #[error("Worker pool is closed")]
    PoolClosed,

    /// Checkpoint persistence error
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExplorerError {
    pub fn expansion(task_id: u64, level: i32, root_id: u64, cursor: Vec<usize>, source: ExplorerError) -> Self {
        Self::Expansion {
            task_id,
            level,
            root_id,
            cursor,
            source: Box::new(source),
        }
    }

    /// Short label for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Enumeration(_) => "enumeration",
            Self::Expansion { .. } => "expansion",
            Self::Consistency { .. } => "consistency",
            Self::Timeout { .. } => "timeout",
            Self::Scoring { .. } => "scoring",
            Self::Interrupted { .. } => "interrupted",
            Self::Library(_) => "library",
            Self::Graph(_) => "graph",
            Self::Storage(_) => "storage",
            Self::Configuration(_) => "configuration",
            Self::PoolClosed => "pool_closed",
            Self::Checkpoint(_) => "checkpoint",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }

    /// The innermost error, looking through expansion wrappers
    pub fn root_cause(&self) -> &ExplorerError {
        match self {
            Self::Expansion { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_error_names_the_combination() {
        let err = ExplorerError::expansion(
            12,
            1,
            3,
            vec![0, 2],
            ExplorerError::Graph("attachment point 4 is already used".to_string()),
        );
        let text = err.to_string();
        assert!(text.contains("task 12"));
        assert!(text.contains("root 3"));
        assert!(text.contains("[0, 2]"));
        assert!(text.contains("already used"));
        assert_eq!(err.kind(), "expansion");
    }

    #[test]
    fn test_root_cause_unwraps_expansion() {
        let err = ExplorerError::expansion(
            1,
            0,
            1,
            vec![],
            ExplorerError::Scoring {
                task_id: 1,
                graph_id: 5,
                exit_code: Some(2),
                stderr: "boom".to_string(),
            },
        );
        assert_eq!(err.root_cause().kind(), "scoring");
    }

    #[test]
    fn test_checkpoint_error_converts() {
        let err: ExplorerError = CheckpointError::Invalid("bad".to_string()).into();
        assert_eq!(err.kind(), "checkpoint");
    }
}
