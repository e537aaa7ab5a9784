//! Command handlers behind the `fragspace` binary

use crate::config::FragspaceConfig;
use anyhow::Context;
use fragspace_checkpoint::{Checkpoint, CheckpointFormat, FileCheckpointSaver};
use fragspace_core::{CandidateStore, ExplorationSummary, Explorer, InMemoryLibrary, ShutdownCoordinator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Command line values that override the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub library: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub db_root: Option<PathBuf>,
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub max_level: Option<i32>,
    pub level_timeout_secs: Option<u64>,
    pub checkpoint_interval: Option<usize>,
    pub resume_from: Option<PathBuf>,
    pub root_graphs: Option<PathBuf>,
    pub scoring_program: Option<PathBuf>,
    pub no_symmetry: bool,
}

impl RunOverrides {
    pub fn apply(self, config: &mut FragspaceConfig) {
        let settings = &mut config.explorer;
        if let Some(path) = self.library {
            config.library.path = Some(path);
        }
        if let Some(dir) = self.work_dir {
            settings.work_dir = dir;
        }
        if self.db_root.is_some() {
            settings.db_root = self.db_root;
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            settings.queue_capacity = capacity;
        }
        if let Some(level) = self.max_level {
            settings.max_level = level;
        }
        if let Some(secs) = self.level_timeout_secs {
            settings.level_timeout_secs = secs;
        }
        if let Some(interval) = self.checkpoint_interval {
            settings.checkpoint_interval = interval;
        }
        if self.resume_from.is_some() {
            settings.resume_from = self.resume_from;
        }
        if self.root_graphs.is_some() {
            settings.root_graphs = self.root_graphs;
        }
        if let Some(program) = self.scoring_program {
            settings.scoring.enabled = true;
            settings.scoring.program = Some(program);
        }
        if self.no_symmetry {
            settings.enforce_symmetry = false;
        }
    }
}

/// Load the library and run a full exploration
pub async fn run(config: FragspaceConfig, shutdown: ShutdownCoordinator) -> anyhow::Result<ExplorationSummary> {
    let library_path = config
        .library
        .path
        .clone()
        .context("no building block library configured, set [library] path or pass --library")?;
    let library = InMemoryLibrary::from_json_file(&library_path)
        .await
        .with_context(|| format!("failed to load library {}", library_path.display()))?;
    info!(
        library = %library_path.display(),
        scaffolds = library.scaffolds.len(),
        fragments = library.fragments.len(),
        caps = library.caps.len(),
        "Building block library loaded"
    );

    let mut explorer = Explorer::new(config.explorer, Arc::new(library))?.with_shutdown(shutdown);
    Ok(explorer.explore().await?)
}

pub async fn load_checkpoint(path: &Path, format: CheckpointFormat) -> anyhow::Result<Checkpoint> {
    FileCheckpointSaver::new(path, format)
        .load()
        .await
        .with_context(|| format!("failed to read checkpoint {}", path.display()))
}

/// Stored candidates per level under `db_root`, ascending by level
pub async fn level_counts(db_root: &Path) -> anyhow::Result<Vec<(i32, usize)>> {
    let store = CandidateStore::new(db_root);
    let mut counts = Vec::new();
    for level in store.levels().await? {
        counts.push((level, store.count_candidates(level).await?));
    }
    Ok(counts)
}

pub fn render_summary(summary: &ExplorationSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<8} {}\n", "Level", "Candidates"));
    for (level, count) in &summary.candidates_per_level {
        out.push_str(&format!("{:<8} {}\n", level, count));
    }
    out.push_str(&format!(
        "{} tasks in {:.1}s, {}{:?}\n",
        summary.tasks_submitted,
        summary.elapsed.as_secs_f64(),
        if summary.resumed { "resumed, " } else { "" },
        summary.termination
    ));
    out
}
