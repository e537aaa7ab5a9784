//! Exploration settings
//!
//! Every field has a default, so a partial TOML or JSON document deserializes
//! into a complete [`ExplorerSettings`]. Call [`ExplorerSettings::validate`]
//! before handing the settings to an explorer.

use crate::error::{ExplorerError, Result};
use fragspace_checkpoint::CheckpointFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Smallest accepted number of submissions between checkpoints
pub const MIN_CHECKPOINT_INTERVAL: usize = 2;

/// Default name of the checkpoint file inside the work directory
pub const DEFAULT_CHECKPOINT_FILE: &str = "fragspace.chk";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub enabled: bool,
    /// Program run once per finished candidate
    pub program: Option<PathBuf>,
    /// Optional interpreter for `program` (`bash`, `python3`, ...)
    pub interpreter: Option<String>,
    /// Unique-id registry file passed to the program
    pub uid_file: PathBuf,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            program: None,
            interpreter: None,
            uid_file: PathBuf::from("UID.txt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerSettings {
    /// Run directory; scoring files and the default checkpoint live here
    pub work_dir: PathBuf,
    /// Root of the level directories, defaults to `work_dir`
    pub db_root: Option<PathBuf>,
    /// Number of concurrent expansion workers
    pub workers: usize,
    /// Jobs that may wait in the queue before submission blocks
    pub queue_capacity: usize,
    /// Deepest level to grow
    pub max_level: i32,
    /// Wall-clock budget of one level, in seconds
    pub level_timeout_secs: u64,
    /// Seconds between progress lines while waiting for a level
    pub progress_interval_secs: u64,
    /// Submissions between checkpoints
    pub checkpoint_interval: usize,
    /// Seconds running tasks get to finish when the pool shuts down
    pub shutdown_grace_secs: u64,
    pub checkpoint_file: Option<PathBuf>,
    pub checkpoint_format: CheckpointFormat,
    /// Checkpoint to resume a previous run from
    pub resume_from: Option<PathBuf>,
    /// JSON file with user supplied root graphs, used instead of scaffolds
    pub root_graphs: Option<PathBuf>,
    /// Grow symmetric attachment points identically
    pub enforce_symmetry: bool,
    pub scoring: ScoringSettings,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            db_root: None,
            workers: 1,
            queue_capacity: 1,
            max_level: 2,
            level_timeout_secs: 600,
            progress_interval_secs: 5,
            checkpoint_interval: 100,
            shutdown_grace_secs: 30,
            checkpoint_file: None,
            checkpoint_format: CheckpointFormat::default(),
            resume_from: None,
            root_graphs: None,
            enforce_symmetry: true,
            scoring: ScoringSettings::default(),
        }
    }
}

impl ExplorerSettings {
    pub fn db_root(&self) -> PathBuf {
        self.db_root.clone().unwrap_or_else(|| self.work_dir.clone())
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_file
            .clone()
            .unwrap_or_else(|| self.work_dir.join(DEFAULT_CHECKPOINT_FILE))
    }

    pub fn level_timeout(&self) -> Duration {
        Duration::from_secs(self.level_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Check the settings, fixing what can be fixed
    pub fn validate(&mut self) -> Result<()> {
        if self.workers == 0 {
            warn!("Number of workers is 0, using 1 instead");
            self.workers = 1;
        }
        if self.queue_capacity == 0 {
            return Err(ExplorerError::Configuration(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if self.checkpoint_interval < MIN_CHECKPOINT_INTERVAL {
            return Err(ExplorerError::Configuration(format!(
                "checkpoint interval must be at least {}, got {}",
                MIN_CHECKPOINT_INTERVAL, self.checkpoint_interval
            )));
        }
        if self.max_level < 0 {
            return Err(ExplorerError::Configuration(format!(
                "max level must not be negative, got {}",
                self.max_level
            )));
        }
        if self.level_timeout_secs == 0 {
            return Err(ExplorerError::Configuration(
                "level timeout must be at least one second".to_string(),
            ));
        }
        if let Some(path) = &self.resume_from {
            if !path.is_file() {
                return Err(ExplorerError::Configuration(format!(
                    "checkpoint to resume from not found: {}",
                    path.display()
                )));
            }
        }
        if let Some(path) = &self.root_graphs {
            if !path.is_file() {
                return Err(ExplorerError::Configuration(format!(
                    "root graph file not found: {}",
                    path.display()
                )));
            }
        }
        if self.scoring.enabled {
            match &self.scoring.program {
                Some(program) if program.is_file() => {}
                Some(program) => {
                    return Err(ExplorerError::Configuration(format!(
                        "scoring program not found: {}",
                        program.display()
                    )))
                }
                None => {
                    return Err(ExplorerError::Configuration(
                        "scoring is enabled but no scoring program is set".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}
