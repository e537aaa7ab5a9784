//! Level-indexed candidate storage
//!
//! ```text
//! <db_root>/
//!   FSE-Level_-1/
//!     dg_1.json
//!     FSE-Level_-1.txt
//!   FSE-Level_0/
//!     dg_4.json
//!     dg_5.json
//!     FSE-Level_0.txt      <summary> => <graphId> <rootId> [cursor]
//! ```
//!
//! Candidate files are written to a temporary name and renamed into place, so
//! [`CandidateStore::list_candidates`] only ever sees fully written graphs.
//! Index appends are serialized by an async mutex.

use crate::error::{ExplorerError, Result};
use crate::graph::Graph;
use fragspace_checkpoint::Checkpoint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

const LEVEL_PREFIX: &str = "FSE-Level_";
const CANDIDATE_PREFIX: &str = "dg_";
const CANDIDATE_EXT: &str = ".json";

/// A persisted candidate and its lineage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub graph: Graph,
    pub level: i32,
    /// Root the candidate was grown from (0 for seeds)
    pub root_id: u64,
    /// Enumeration cursor following the combination that produced it
    pub cursor: Vec<usize>,
}

impl CandidateRecord {
    pub fn index_line(&self) -> String {
        format!("{} => {} {} {:?}", self.graph, self.graph.id, self.root_id, self.cursor)
    }
}

#[derive(Debug)]
pub struct CandidateStore {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl CandidateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn level_dir(&self, level: i32) -> PathBuf {
        self.root.join(format!("{}{}", LEVEL_PREFIX, level))
    }

    pub fn index_path(&self, level: i32) -> PathBuf {
        self.level_dir(level).join(format!("{}{}.txt", LEVEL_PREFIX, level))
    }

    pub fn candidate_path(&self, level: i32, graph_id: u64) -> PathBuf {
        self.level_dir(level)
            .join(format!("{}{}{}", CANDIDATE_PREFIX, graph_id, CANDIDATE_EXT))
    }

    /// Persist one candidate and append its index line
    pub async fn store(&self, graph: &Graph, level: i32, root_id: u64, cursor: &[usize]) -> Result<PathBuf> {
        let record = CandidateRecord {
            graph: graph.clone(),
            level,
            root_id,
            cursor: cursor.to_vec(),
        };
        let dir = self.level_dir(level);
        fs::create_dir_all(&dir).await?;

        let path = self.candidate_path(level, graph.id);
        if fs::try_exists(&path).await? {
            return Err(ExplorerError::Storage(format!(
                "candidate {} already exists at level {}",
                graph.id, level
            )));
        }
        let tmp = dir.join(format!(".{}{}.tmp", CANDIDATE_PREFIX, graph.id));
        fs::write(&tmp, serde_json::to_vec_pretty(&record)?).await?;
        fs::rename(&tmp, &path).await?;

        let line = record.index_line();
        {
            let _guard = self.index_lock.lock().await;
            let mut index = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.index_path(level))
                .await?;
            index.write_all(line.as_bytes()).await?;
            index.write_all(b"\n").await?;
            index.flush().await?;
        }

        debug!(graph_id = graph.id, level, root_id, cursor = ?cursor, "Candidate stored");
        Ok(path)
    }

    /// Ids of the candidates durably written at `level`, ascending
    pub async fn list_candidates(&self, level: i32) -> Result<Vec<u64>> {
        let mut entries = match fs::read_dir(self.level_dir(level)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name
                .strip_prefix(CANDIDATE_PREFIX)
                .and_then(|rest| rest.strip_suffix(CANDIDATE_EXT))
                .and_then(|id| id.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    pub async fn count_candidates(&self, level: i32) -> Result<usize> {
        Ok(self.list_candidates(level).await?.len())
    }

    pub async fn load_candidate(&self, level: i32, graph_id: u64) -> Result<CandidateRecord> {
        let path = self.candidate_path(level, graph_id);
        let bytes = fs::read(&path).await.map_err(|e| {
            ExplorerError::Storage(format!("cannot read candidate {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn delete_candidate(&self, level: i32, graph_id: u64) -> Result<()> {
        fs::remove_file(self.candidate_path(level, graph_id)).await?;
        Ok(())
    }

    /// Levels that have a directory under the storage root, ascending
    pub async fn levels(&self) -> Result<Vec<i32>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut levels = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(level) = entry
                .file_name()
                .to_str()
                .and_then(|n| n.strip_prefix(LEVEL_PREFIX))
                .and_then(|n| n.parse::<i32>().ok())
            {
                levels.push(level);
            }
        }
        levels.sort_unstable();
        Ok(levels)
    }

    /// Bring storage back to what `checkpoint` vouches for
    ///
    /// Deletes every candidate of the checkpoint level that is not provably
    /// part of the completed prefix, drops their index lines, and removes the
    /// directories of any later level. Returns the deleted candidate ids.
    pub async fn remove_unsafe_candidates(&self, checkpoint: &Checkpoint) -> Result<Vec<u64>> {
        let level = checkpoint.level;
        let mut removed = Vec::new();
        for id in self.list_candidates(level).await? {
            let record = self.load_candidate(level, id).await?;
            if !checkpoint.is_candidate_safe(id, record.root_id, &record.cursor) {
                self.delete_candidate(level, id).await?;
                removed.push(id);
            }
        }
        if !removed.is_empty() {
            self.prune_index(level, &removed).await?;
        }

        for later in self.levels().await?.into_iter().filter(|l| *l > level) {
            fs::remove_dir_all(self.level_dir(later)).await?;
            info!(level = later, "Removed level directory newer than checkpoint");
        }

        info!(
            level,
            removed = removed.len(),
            last_safe_graph_id = ?checkpoint.last_safe_graph_id,
            "Removed candidates not covered by checkpoint"
        );
        Ok(removed)
    }

    async fn prune_index(&self, level: i32, removed: &[u64]) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        let path = self.index_path(level);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let kept: String = text
            .lines()
            .filter(|line| index_line_graph_id(line).map_or(true, |id| !removed.contains(&id)))
            .flat_map(|line| [line, "\n"])
            .collect();
        let tmp = path.with_extension("txt.tmp");
        fs::write(&tmp, kept).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Graph id recorded on an index line
pub fn index_line_graph_id(line: &str) -> Option<u64> {
    line.rsplit_once(" => ")?
        .1
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}
