//! Common test fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use fragspace_core::{
    AttachmentPoint, BlockRef, BuildingBlock, CandidateRecord, CandidateStore, ExplorerError, ExplorerSettings, Graph,
    InMemoryLibrary, LibraryRules, Result, ScoreReport, Scorer, ScoringRequest, Vertex,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn classes(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Scaffold R0 with points A and B; A admits F1 and F2, B admits F3
pub fn two_point_library() -> InMemoryLibrary {
    let mut rules = LibraryRules::default();
    rules.compatibility.insert("A".to_string(), classes(&["f1", "f2"]));
    rules.compatibility.insert("B".to_string(), classes(&["f3"]));
    rules.forbidden_ends.extend(classes(&["A", "B"]));

    InMemoryLibrary::new()
        .with_scaffold(BuildingBlock::new("R0", &["A", "B"]))
        .with_fragment(BuildingBlock::new("F1", &["f1"]))
        .with_fragment(BuildingBlock::new("F2", &["f2"]))
        .with_fragment(BuildingBlock::new("F3", &["f3"]))
        .with_rules(rules)
}

/// One scaffold with `points` independent points, each admitting
/// `fragments` terminal fragments
pub fn grid_library(points: usize, fragments: usize) -> InMemoryLibrary {
    let mut rules = LibraryRules::default();
    rules.compatibility.insert("p".to_string(), classes(&["t"]));
    rules.forbidden_ends.insert("p".to_string());

    let scaffold_points = vec!["p"; points];
    let mut library = InMemoryLibrary::new().with_scaffold(BuildingBlock::new("core", &scaffold_points));
    for i in 0..fragments {
        library = library.with_fragment(BuildingBlock::new(format!("T{}", i), &["t"]));
    }
    library.with_rules(rules)
}

/// Scaffold with `points` symmetric points of a symmetry-imposing class
pub fn symmetric_library(points: usize, fragments: usize) -> InMemoryLibrary {
    let mut library = grid_library(points, fragments);
    library.scaffolds[0].symmetric_ap_sets = vec![(0..points).collect()];
    library.rules.symmetric_classes.insert("p".to_string());
    library
}

/// Chain growth: every fragment carries a new open point, which may also be
/// left empty, so each level doubles the number of candidates
pub fn chain_library() -> InMemoryLibrary {
    let mut rules = LibraryRules::default();
    rules.compatibility.insert("a".to_string(), classes(&["x"]));

    InMemoryLibrary::new()
        .with_scaffold(BuildingBlock::new("start", &["a"]))
        .with_fragment(BuildingBlock::new("link", &["x", "a"]))
        .with_rules(rules)
}

pub fn settings(work_dir: &Path) -> ExplorerSettings {
    ExplorerSettings {
        work_dir: work_dir.to_path_buf(),
        workers: 2,
        queue_capacity: 2,
        max_level: 0,
        level_timeout_secs: 30,
        progress_interval_secs: 1,
        checkpoint_interval: 2,
        shutdown_grace_secs: 1,
        ..Default::default()
    }
}

/// Root graph holding a single R0 scaffold vertex, as a user would supply it
pub fn scaffold_root(graph_id: u64, vertex_id: u64) -> Graph {
    let mut graph = Graph::new(graph_id);
    graph.add_vertex(Vertex::new(
        vertex_id,
        BlockRef::scaffold(0),
        vec![AttachmentPoint::new("A"), AttachmentPoint::new("B")],
        -1,
    ));
    graph
}

/// Write `roots` as a JSON array and return the file path
pub fn write_roots(dir: &Path, roots: &[Graph]) -> PathBuf {
    let path = dir.join("roots.json");
    std::fs::write(&path, serde_json::to_vec_pretty(roots).unwrap()).expect("Failed to write roots");
    path
}

pub fn checkpoint_path(work_dir: &Path) -> PathBuf {
    work_dir.join("fragspace.chk")
}

/// Every stored candidate of `level`, ascending by id
pub async fn records(store: &CandidateStore, level: i32) -> Vec<CandidateRecord> {
    let mut out = Vec::new();
    for id in store.list_candidates(level).await.unwrap() {
        out.push(store.load_candidate(level, id).await.unwrap());
    }
    out
}

pub fn index_lines(store: &CandidateStore, level: i32) -> Vec<String> {
    std::fs::read_to_string(store.index_path(level))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Scorer that accepts everything after an optional delay
#[derive(Default)]
pub struct RecordingScorer {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl RecordingScorer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Scorer for RecordingScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoreReport> {
        tokio::time::sleep(self.delay).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ScoreReport {
            name: request.name(),
            output: PathBuf::from(format!("{}_out.json", request.name())),
            fitness: Some(request.graph.vertices.len() as f64),
        })
    }
}

/// Scorer that fails on its `fail_on`-th call (1-based)
pub struct FailingScorer {
    pub fail_on: usize,
    pub calls: AtomicUsize,
}

impl FailingScorer {
    pub fn new(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Scorer for FailingScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoreReport> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(ExplorerError::Scoring {
                task_id: request.task_id,
                graph_id: request.graph.id,
                exit_code: Some(1),
                stderr: "simulated crash".to_string(),
            });
        }
        Ok(ScoreReport {
            name: request.name(),
            output: PathBuf::new(),
            fitness: None,
        })
    }
}
