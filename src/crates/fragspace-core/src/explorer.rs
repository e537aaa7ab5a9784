//! Level driver
//!
//! The [`Explorer`] owns the whole run: it seeds the root graphs (level -1),
//! then grows every stored graph of the previous level one layer at a time up
//! to the maximum level. For each level it
//!
//! 1. walks the roots of the previous level in ascending id order,
//! 2. enumerates each root with a [`CombinationIterator`],
//! 3. submits one [`ExpansionTask`] per combination to the [`WorkerPool`],
//! 4. checkpoints the completed prefix every `checkpoint_interval` submissions,
//! 5. waits for the level's task events against the level deadline,
//! 6. cross-checks the stored candidates against what the tasks reported.
//!
//! Any task failure, timeout, interruption or mismatch stops the run. The
//! worker pool is started and shut down by [`Explorer::explore`] on every
//! exit path.

use crate::combination::CombinationIterator;
use crate::counters::CounterRegistry;
use crate::error::{ExplorerError, Result};
use crate::finishing::{GraphFinisher, RuleBasedFinisher};
use crate::graph::{BlockKind, BlockRef, Graph};
use crate::ledger::TaskLedger;
use crate::library::BuildingBlockLibrary;
use crate::pool::{Job, WorkerPool};
use crate::scoring::{ExternalProcessScorer, Scorer};
use crate::settings::ExplorerSettings;
use crate::shutdown::ShutdownCoordinator;
use crate::storage::CandidateStore;
use crate::task::{ExpansionContext, ExpansionTask, TaskReport};
use chrono::{DateTime, Utc};
use fragspace_checkpoint::{Checkpoint, CheckpointSaver, FileCheckpointSaver};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Level of the seeded root graphs
pub const SEED_LEVEL: i32 = -1;

/// Why an exploration ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every level up to the maximum was explored
    MaxLevelReached,
    /// The previous level stored no graph to grow
    NoExtendableGraph { level: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplorationSummary {
    /// Stored candidates per explored level, seeds included
    pub candidates_per_level: BTreeMap<i32, usize>,
    /// Expansion tasks submitted by this run
    pub tasks_submitted: usize,
    pub resumed: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub termination: Termination,
}

impl ExplorationSummary {
    /// Deepest level this run finished, if any
    pub fn last_level(&self) -> Option<i32> {
        self.candidates_per_level.keys().next_back().copied()
    }

    pub fn total_candidates(&self) -> usize {
        self.candidates_per_level.values().sum()
    }
}

#[derive(Debug)]
enum TaskEvent {
    Completed(TaskReport),
    Failed { task_id: u64, error: ExplorerError },
}

struct LevelOutcome {
    tasks: usize,
    stored: usize,
}

pub struct Explorer {
    settings: ExplorerSettings,
    ctx: ExpansionContext,
    saver: Arc<dyn CheckpointSaver>,
    shutdown: ShutdownCoordinator,
    resume: Option<Checkpoint>,
    roots: Option<Vec<Graph>>,
    next_task_id: u64,
    tasks_submitted: usize,
}

impl Explorer {
    /// Create an explorer with the rule-based finisher, the file checkpoint
    /// saver and, when enabled, the external process scorer
    pub fn new(mut settings: ExplorerSettings, library: Arc<dyn BuildingBlockLibrary>) -> Result<Self> {
        settings.validate()?;

        let scorer: Option<Arc<dyn Scorer>> = match (&settings.scoring.program, settings.scoring.enabled) {
            (Some(program), true) => {
                let mut scorer =
                    ExternalProcessScorer::new(program, &settings.work_dir, &settings.scoring.uid_file);
                if let Some(interpreter) = &settings.scoring.interpreter {
                    scorer = scorer.with_interpreter(interpreter);
                }
                Some(Arc::new(scorer))
            }
            _ => None,
        };
        let saver = Arc::new(FileCheckpointSaver::new(
            settings.checkpoint_path(),
            settings.checkpoint_format,
        ));

        let ctx = ExpansionContext {
            finisher: Arc::new(RuleBasedFinisher::new(library.clone())),
            library,
            scorer,
            store: Arc::new(CandidateStore::new(settings.db_root())),
            counters: Arc::new(CounterRegistry::new()),
        };

        Ok(Self {
            settings,
            ctx,
            saver,
            shutdown: ShutdownCoordinator::new(),
            resume: None,
            roots: None,
            next_task_id: 0,
            tasks_submitted: 0,
        })
    }

    pub fn with_finisher(mut self, finisher: Arc<dyn GraphFinisher>) -> Self {
        self.ctx.finisher = finisher;
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.ctx.scorer = Some(scorer);
        self
    }

    pub fn with_checkpoint_saver(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.saver = saver;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Resume from `checkpoint` instead of the configured checkpoint file
    pub fn with_resume(mut self, checkpoint: Checkpoint) -> Self {
        self.resume = Some(checkpoint);
        self
    }

    /// Seed from these graphs instead of the library scaffolds
    pub fn with_roots(mut self, roots: Vec<Graph>) -> Self {
        self.roots = Some(roots);
        self
    }

    pub fn settings(&self) -> &ExplorerSettings {
        &self.settings
    }

    pub fn counters(&self) -> &Arc<CounterRegistry> {
        &self.ctx.counters
    }

    pub fn store(&self) -> &Arc<CandidateStore> {
        &self.ctx.store
    }

    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Run the exploration
    ///
    /// Starts the worker pool, drives all levels and always shuts the pool
    /// down (cancelling queued work on failure) before returning.
    pub async fn explore(&mut self) -> Result<ExplorationSummary> {
        let started = Instant::now();
        let resume = self.take_resume_checkpoint().await?;

        let mut pool = WorkerPool::new(self.settings.workers, self.settings.queue_capacity);
        let result = self.drive(&pool, resume).await;
        if let Err(e) = &result {
            error!(kind = e.kind(), error = %e, "Exploration aborted");
            pool.cancel_pending();
        }
        pool.shutdown(self.settings.shutdown_grace()).await;

        let mut summary = result?;
        summary.elapsed = started.elapsed();
        info!(
            started_at = %summary.started_at.to_rfc3339(),
            levels = summary.candidates_per_level.len(),
            candidates = summary.total_candidates(),
            tasks = summary.tasks_submitted,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            termination = ?summary.termination,
            "Exploration finished"
        );
        Ok(summary)
    }

    async fn take_resume_checkpoint(&mut self) -> Result<Option<Checkpoint>> {
        if let Some(chk) = self.resume.take() {
            chk.validate()?;
            return Ok(Some(chk));
        }
        match &self.settings.resume_from {
            Some(path) => {
                let saver = FileCheckpointSaver::new(path, self.settings.checkpoint_format);
                Ok(Some(saver.load().await?))
            }
            None => Ok(None),
        }
    }

    async fn drive(&mut self, pool: &WorkerPool, resume: Option<Checkpoint>) -> Result<ExplorationSummary> {
        let mut summary = ExplorationSummary {
            candidates_per_level: BTreeMap::new(),
            tasks_submitted: 0,
            resumed: false,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            termination: Termination::MaxLevelReached,
        };

        let (mut level, mut resume_from) = match resume.filter(|chk| !chk.is_fresh()) {
            Some(chk) => {
                summary.resumed = true;
                self.restore(chk).await?
            }
            None => {
                let seeded = self.seed().await?;
                summary.candidates_per_level.insert(SEED_LEVEL, seeded);
                (0, None)
            }
        };

        while level <= self.settings.max_level {
            self.check_interrupt(level)?;

            let roots = self.ctx.store.list_candidates(level - 1).await?;
            if roots.is_empty() {
                info!(level, "No extendable graph left, stopping exploration");
                summary.termination = Termination::NoExtendableGraph { level };
                break;
            }

            info!(level, roots = roots.len(), "Starting exploration of level");
            let outcome = self.explore_level(pool, level, &roots, resume_from.take()).await?;
            info!(
                level,
                tasks = outcome.tasks,
                candidates = outcome.stored,
                "Exploration of level completed"
            );
            summary.candidates_per_level.insert(level, outcome.stored);
            level += 1;
        }

        summary.tasks_submitted = self.tasks_submitted;
        Ok(summary)
    }

    /// Bring counters and storage back to the checkpoint and decide where to
    /// continue
    async fn restore(&mut self, chk: Checkpoint) -> Result<(i32, Option<Checkpoint>)> {
        warn!(checkpoint = %chk, "Restarting exploration from checkpoint");
        self.ctx.counters.reseed(chk.counters);
        let removed = self.ctx.store.remove_unsafe_candidates(&chk).await?;
        for id in &removed {
            debug!(graph_id = id, level = chk.level, "Removed candidate not covered by checkpoint");
        }

        if chk.level == SEED_LEVEL {
            return Ok((0, None));
        }
        Ok((chk.level, Some(chk)))
    }

    /// Store the level -1 root graphs; returns how many were stored
    async fn seed(&mut self) -> Result<usize> {
        let roots = match (self.roots.take(), &self.settings.root_graphs) {
            (Some(roots), _) => self.adopt_roots(roots)?,
            (None, Some(path)) => {
                let roots = read_root_graphs(path).await?;
                self.adopt_roots(roots)?
            }
            (None, None) => self.roots_from_scaffolds()?,
        };

        let mut last_id = None;
        for root in &roots {
            self.ctx.store.store(root, SEED_LEVEL, 0, &[]).await?;
            last_id = last_id.max(Some(root.id));
        }
        info!(roots = roots.len(), "Root graphs stored");

        if let Some(last_safe) = last_id {
            let chk = Checkpoint::new(SEED_LEVEL, 0, last_safe, Vec::new(), self.ctx.counters.snapshot());
            self.saver.put(&chk).await?;
        }
        Ok(roots.len())
    }

    /// Move user supplied graphs into this run's id space
    ///
    /// Every graph is checked before any id is drawn, so a malformed root
    /// leaves the counters untouched.
    fn adopt_roots(&self, roots: Vec<Graph>) -> Result<Vec<Graph>> {
        for g in &roots {
            g.check()?;
        }
        Ok(roots
            .iter()
            .map(|g| {
                let adopted = g.renumbered(self.ctx.counters.next_graph_id(), &self.ctx.counters);
                debug!(supplied_id = g.id, graph_id = adopted.id, "Adopted user root graph");
                adopted
            })
            .collect())
    }

    fn roots_from_scaffolds(&self) -> Result<Vec<Graph>> {
        let library = &self.ctx.library;
        (0..library.count(BlockKind::Scaffold))
            .map(|index| {
                let vertex =
                    library.instantiate(BlockRef::scaffold(index), self.ctx.counters.next_vertex_id(), SEED_LEVEL)?;
                let mut graph = Graph::new(self.ctx.counters.next_graph_id());
                graph.add_vertex(vertex);
                Ok(graph)
            })
            .collect()
    }

    fn check_interrupt(&self, level: i32) -> Result<()> {
        if self.shutdown.is_shutdown_requested() {
            return Err(ExplorerError::Interrupted { level });
        }
        Ok(())
    }

    async fn explore_level(
        &mut self,
        pool: &WorkerPool,
        level: i32,
        roots: &[u64],
        resume: Option<Checkpoint>,
    ) -> Result<LevelOutcome> {
        let deadline = Instant::now() + self.settings.level_timeout();
        let present_at_start = self.ctx.store.count_candidates(level).await?;
        if present_at_start > 0 {
            info!(level, candidates = present_at_start, "Level already holds candidates from a previous run");
        }

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<TaskEvent>();
        let mut ledger = TaskLedger::new();
        let mut since_checkpoint = 0;

        for &root_id in roots {
            if resume.as_ref().is_some_and(|chk| chk.root_already_used(root_id)) {
                debug!(level, root_id, "Root already explored before restart");
                continue;
            }

            let root = self.ctx.store.load_candidate(level - 1, root_id).await?.graph;
            let mut combinations =
                CombinationIterator::new(&root, self.ctx.library.as_ref(), self.settings.enforce_symmetry)?;
            if let Some(chk) = resume.as_ref().filter(|chk| chk.root_id == Some(root_id)) {
                combinations.resume_from(&chk.next_cursor)?;
            }
            info!(
                level,
                root_id,
                combinations = combinations.total_combinations(),
                start = combinations.position(),
                active_points = combinations.active_point_count(),
                sizes = ?combinations.candidate_set_sizes(),
                "Enumerating combinations of root"
            );

            for combination in combinations {
                self.check_interrupt(level)?;
                self.next_task_id += 1;
                let task_id = self.next_task_id;
                ledger.register(task_id, root_id, combination.next_cursor.clone());
                let task = ExpansionTask::new(task_id, level, root.clone(), combination);
                let job = self.job(task, events_tx.clone());

                tokio::select! {
                    submitted = pool.submit(job) => submitted?,
                    _ = tokio::time::sleep_until(deadline) => return Err(self.timeout(level, &ledger)),
                    _ = self.shutdown.wait_for_shutdown() => return Err(ExplorerError::Interrupted { level }),
                }
                self.tasks_submitted += 1;
                since_checkpoint += 1;

                while let Ok(event) = events_rx.try_recv() {
                    handle_event(&mut ledger, event)?;
                }
                if since_checkpoint >= self.settings.checkpoint_interval {
                    self.checkpoint(level, &ledger).await?;
                    since_checkpoint = 0;
                }
            }
        }
        drop(events_tx);

        self.await_level(level, &mut ledger, &mut events_rx, deadline).await?;
        self.checkpoint(level, &ledger).await?;

        let stored = self.ctx.store.count_candidates(level).await?;
        let expected = present_at_start + ledger.reported_candidates();
        if stored != expected {
            return Err(ExplorerError::Consistency {
                level,
                expected,
                stored,
            });
        }
        Ok(LevelOutcome {
            tasks: ledger.submitted(),
            stored,
        })
    }

    fn job(&self, task: ExpansionTask, events: mpsc::UnboundedSender<TaskEvent>) -> Job {
        let ctx = self.ctx.clone();
        async move {
            let task_id = task.id;
            let event = match task.run(&ctx).await {
                Ok(report) => TaskEvent::Completed(report),
                Err(error) => TaskEvent::Failed { task_id, error },
            };
            // The driver may already be gone after an abort
            let _ = events.send(event);
        }
        .boxed()
    }

    async fn await_level(
        &self,
        level: i32,
        ledger: &mut TaskLedger,
        events: &mut mpsc::UnboundedReceiver<TaskEvent>,
        deadline: Instant,
    ) -> Result<()> {
        let started = Instant::now();
        let mut progress = tokio::time::interval(self.settings.progress_interval());
        progress.tick().await;

        while !ledger.all_completed() {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => handle_event(ledger, event)?,
                    None => {
                        return Err(ExplorerError::Storage(format!(
                            "{} tasks of level {} ended without reporting",
                            ledger.outstanding(),
                            level
                        )));
                    }
                },
                _ = tokio::time::sleep_until(deadline) => return Err(self.timeout(level, ledger)),
                _ = self.shutdown.wait_for_shutdown() => return Err(ExplorerError::Interrupted { level }),
                _ = progress.tick() => {
                    info!(
                        level,
                        completed = ledger.completed(),
                        submitted = ledger.submitted(),
                        elapsed_secs = started.elapsed().as_secs(),
                        "Waiting for completion of level"
                    );
                }
            }
        }
        Ok(())
    }

    fn timeout(&self, level: i32, ledger: &TaskLedger) -> ExplorerError {
        error!(
            level,
            timeout_secs = self.settings.level_timeout_secs,
            completed = ledger.completed(),
            outstanding = ledger.outstanding(),
            "Level timed out, stopping all tasks"
        );
        debug!(level, pending = ?ledger.pending_tasks(), "Tasks still pending at timeout");
        ExplorerError::Timeout {
            level,
            waited_secs: self.settings.level_timeout_secs,
        }
    }

    /// Persist the end of the completed prefix, if there is one
    async fn checkpoint(&self, level: i32, ledger: &TaskLedger) -> Result<()> {
        let Some(safe) = ledger.safe_point() else {
            debug!(level, "No completed prefix yet, checkpoint skipped");
            return Ok(());
        };
        let chk = Checkpoint::new(
            level,
            safe.root_id,
            safe.last_safe_graph_id,
            safe.next_cursor,
            self.ctx.counters.snapshot(),
        );
        self.saver.put(&chk).await?;
        info!(
            level,
            root_id = safe.root_id,
            last_safe_graph_id = safe.last_safe_graph_id,
            safe_tasks = safe.tasks,
            location = %self.saver.location(),
            "Checkpoint saved"
        );
        Ok(())
    }
}

fn handle_event(ledger: &mut TaskLedger, event: TaskEvent) -> Result<()> {
    match event {
        TaskEvent::Completed(report) => {
            ledger.complete(report.task_id, report.graph_ids);
            Ok(())
        }
        TaskEvent::Failed { task_id, error } => {
            ledger.fail(task_id);
            Err(error)
        }
    }
}

/// Read user supplied root graphs from a JSON array
///
/// Each graph is checked structurally; ids are left as written.
pub async fn read_root_graphs(path: impl AsRef<Path>) -> Result<Vec<Graph>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ExplorerError::Graph(format!("cannot read root graphs {}: {}", path.display(), e)))?;
    let roots: Vec<Graph> = serde_json::from_str(&text)?;
    for graph in &roots {
        graph.check().map_err(|e| match e {
            ExplorerError::Graph(reason) => {
                ExplorerError::Graph(format!("invalid root graph {} in {}: {}", graph.id, path.display(), reason))
            }
            other => other,
        })?;
    }
    Ok(roots)
}
