//! Expansion task: one combination applied to one root
//!
//! A task owns its own copy of the root graph, so no two tasks ever mutate the
//! same graph. The only shared state it touches is the counter registry and the
//! candidate store, both of which serialize internally.

use crate::combination::Combination;
use crate::counters::CounterRegistry;
use crate::error::{ExplorerError, Result};
use crate::finishing::{FinishOutcome, GraphFinisher};
use crate::graph::{ApRef, Graph};
use crate::library::{BuildingBlockLibrary, Choice};
use crate::scoring::{Scorer, ScoringRequest};
use crate::storage::CandidateStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Collaborators shared by every task of a run
#[derive(Clone)]
pub struct ExpansionContext {
    pub library: Arc<dyn BuildingBlockLibrary>,
    pub finisher: Arc<dyn GraphFinisher>,
    pub scorer: Option<Arc<dyn Scorer>>,
    pub store: Arc<CandidateStore>,
    pub counters: Arc<CounterRegistry>,
}

/// What a completed task produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    pub task_id: u64,
    /// Ids of the stored candidates, in storage order
    pub graph_ids: Vec<u64>,
    /// Number of candidates sent to the scorer
    pub scored: usize,
}

#[derive(Debug, Clone)]
pub struct ExpansionTask {
    pub id: u64,
    pub level: i32,
    pub root_id: u64,
    root: Graph,
    combination: Combination,
}

impl ExpansionTask {
    pub fn new(id: u64, level: i32, root: Graph, combination: Combination) -> Self {
        Self {
            id,
            level,
            root_id: root.id,
            root,
            combination,
        }
    }

    pub fn combination(&self) -> &Combination {
        &self.combination
    }

    /// Build the grown graph: a copy of the root with every chosen block
    /// attached, under a fresh graph id
    pub fn grow(&self, library: &dyn BuildingBlockLibrary, counters: &CounterRegistry) -> Result<Graph> {
        let mut graph = self.root.clone();
        graph.id = counters.next_graph_id();

        let mut siblings: BTreeMap<usize, Vec<u64>> = BTreeMap::new();
        for assignment in &self.combination.assignments {
            let Choice::Attach { block, ap } = assignment.choice else {
                continue;
            };
            let source_level = graph.vertex(assignment.source.vertex)?.level;
            let vertex_id = counters.next_vertex_id();
            let vertex = library.instantiate(block, vertex_id, source_level + 1)?;
            let idx = graph.add_vertex(vertex);
            graph.connect(assignment.source, ApRef::new(idx, ap))?;
            siblings.entry(assignment.symmetry_group).or_default().push(vertex_id);
        }
        for (_, ids) in siblings {
            graph.add_symmetric_vertex_set(ids);
        }
        Ok(graph)
    }

    /// Run the task, tagging any failure with the task's lineage
    pub async fn run(self, ctx: &ExpansionContext) -> Result<TaskReport> {
        match self.execute(ctx).await {
            Ok(report) => Ok(report),
            Err(e) => Err(ExplorerError::expansion(
                self.id,
                self.level,
                self.root_id,
                self.combination.cursor.clone(),
                e,
            )),
        }
    }

    async fn execute(&self, ctx: &ExpansionContext) -> Result<TaskReport> {
        debug!(
            task_id = self.id,
            level = self.level,
            root_id = self.root_id,
            cursor = ?self.combination.cursor,
            "Expansion task started"
        );
        let graph = self.grow(ctx.library.as_ref(), &ctx.counters)?;
        let mut report = TaskReport {
            task_id: self.id,
            ..Default::default()
        };

        match ctx.finisher.finish(&graph, &ctx.counters)? {
            FinishOutcome::NeedsGrowth => {
                self.store(ctx, &graph, &mut report).await?;
            }
            FinishOutcome::Alternatives(alternatives) => {
                // The acyclic graph is replaced by its cyclic alternatives
                info!(
                    task_id = self.id,
                    graph_id = graph.id,
                    alternatives = alternatives.len(),
                    "Graph replaced by ring-closure alternatives"
                );
                for alt in &alternatives {
                    self.store(ctx, alt, &mut report).await?;
                    self.score(ctx, alt, &mut report).await?;
                }
            }
            FinishOutcome::Single { scorable } => {
                self.store(ctx, &graph, &mut report).await?;
                if scorable {
                    self.score(ctx, &graph, &mut report).await?;
                }
            }
        }

        debug!(
            task_id = self.id,
            graph_ids = ?report.graph_ids,
            scored = report.scored,
            "Expansion task completed"
        );
        Ok(report)
    }

    async fn store(&self, ctx: &ExpansionContext, graph: &Graph, report: &mut TaskReport) -> Result<()> {
        ctx.store
            .store(graph, self.level, self.root_id, &self.combination.next_cursor)
            .await?;
        report.graph_ids.push(graph.id);
        Ok(())
    }

    async fn score(&self, ctx: &ExpansionContext, graph: &Graph, report: &mut TaskReport) -> Result<()> {
        let Some(scorer) = &ctx.scorer else {
            return Ok(());
        };
        let request = ScoringRequest {
            task_id: self.id,
            candidate_id: ctx.counters.next_candidate_id(),
            root_id: self.root_id,
            level: self.level,
            graph: graph.clone(),
        };
        scorer.score(&request).await?;
        report.scored += 1;
        Ok(())
    }
}
