//! Graph finishing and validity collaborator

use crate::counters::CounterRegistry;
use crate::error::Result;
use crate::graph::{ApRef, Graph};
use crate::library::BuildingBlockLibrary;
use std::sync::Arc;

/// What the finishing collaborator decided about a grown graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Not acceptable as a finished entity; stored as is for further growth
    /// and never scored
    NeedsGrowth,
    /// Finished ring-closure alternatives that replace the acyclic graph
    Alternatives(Vec<Graph>),
    /// The graph itself is the candidate; `scorable` is false while it still
    /// has attachment points that need capping
    Single { scorable: bool },
}

/// Decides whether a grown graph is finished
///
/// Implementations must not modify `graph`; alternatives are returned as new
/// graphs with fresh ids drawn from `counters`.
pub trait GraphFinisher: Send + Sync {
    fn finish(&self, graph: &Graph, counters: &CounterRegistry) -> Result<FinishOutcome>;
}

/// Finisher driven by the attachment point rules of the library
pub struct RuleBasedFinisher {
    library: Arc<dyn BuildingBlockLibrary>,
}

impl RuleBasedFinisher {
    pub fn new(library: Arc<dyn BuildingBlockLibrary>) -> Self {
        Self { library }
    }

    fn class_of<'g>(&self, graph: &'g Graph, at: ApRef) -> Result<&'g str> {
        Ok(graph.attachment_point(at)?.class.as_str())
    }

    /// Free attachment point pairs that may close a ring
    fn ring_closing_pairs(&self, graph: &Graph, free: &[ApRef]) -> Result<Vec<(ApRef, ApRef)>> {
        let mut pairs = Vec::new();
        for (i, a) in free.iter().enumerate() {
            for b in &free[i + 1..] {
                if a.vertex == b.vertex || graph.are_adjacent(a.vertex, b.vertex) {
                    continue;
                }
                if self
                    .library
                    .can_close_ring(self.class_of(graph, *a)?, self.class_of(graph, *b)?)
                {
                    pairs.push((*a, *b));
                }
            }
        }
        Ok(pairs)
    }
}

impl GraphFinisher for RuleBasedFinisher {
    fn finish(&self, graph: &Graph, counters: &CounterRegistry) -> Result<FinishOutcome> {
        let free = graph.free_attachment_points();
        let mut needs_capping = false;
        for at in &free {
            let class = self.class_of(graph, *at)?;
            if self.library.is_forbidden_end(class) {
                return Ok(FinishOutcome::NeedsGrowth);
            }
            needs_capping |= self.library.capping_class(class).is_some();
        }

        // Cyclic variants of a graph that still needs capping are dead ends
        if needs_capping {
            return Ok(FinishOutcome::Single { scorable: false });
        }

        let pairs = self.ring_closing_pairs(graph, &free)?;
        if pairs.is_empty() {
            return Ok(FinishOutcome::Single { scorable: true });
        }

        let mut alternatives = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            let mut alt = graph.clone();
            alt.id = counters.next_graph_id();
            alt.close_ring(a, b)?;
            alt.note = Some(format!("ring alternative of graph {}", graph.id));
            alternatives.push(alt);
        }
        Ok(FinishOutcome::Alternatives(alternatives))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttachmentPoint, BlockRef, Vertex};
    use crate::library::{InMemoryLibrary, LibraryRules};

    fn finisher(rules: LibraryRules) -> RuleBasedFinisher {
        RuleBasedFinisher::new(Arc::new(InMemoryLibrary::new().with_rules(rules)))
    }

    /// Scaffold with two fragments hanging off it, each with one free point
    fn chain(class: &str) -> Graph {
        let mut g = Graph::new(10);
        let ap = |c: &str| AttachmentPoint::new(c);
        g.add_vertex(Vertex::new(1, BlockRef::scaffold(0), vec![ap("s"), ap("s")], -1));
        g.add_vertex(Vertex::new(2, BlockRef::fragment(0), vec![ap("s"), ap(class)], 0));
        g.add_vertex(Vertex::new(3, BlockRef::fragment(0), vec![ap("s"), ap(class)], 0));
        g.connect(ApRef::new(0, 0), ApRef::new(1, 0)).unwrap();
        g.connect(ApRef::new(0, 1), ApRef::new(2, 0)).unwrap();
        g
    }

    #[test]
    fn test_forbidden_end_needs_growth() {
        let mut rules = LibraryRules::default();
        rules.forbidden_ends.insert("x".to_string());
        let outcome = finisher(rules).finish(&chain("x"), &CounterRegistry::new()).unwrap();
        assert_eq!(outcome, FinishOutcome::NeedsGrowth);
    }

    #[test]
    fn test_capping_suppresses_ring_alternatives() {
        let mut rules = LibraryRules::default();
        rules.capping.insert("r".to_string(), "h".to_string());
        rules.ring_closing_pairs.push(("r".to_string(), "r".to_string()));
        let outcome = finisher(rules).finish(&chain("r"), &CounterRegistry::new()).unwrap();
        assert_eq!(outcome, FinishOutcome::Single { scorable: false });
    }

    #[test]
    fn test_ring_alternatives_get_fresh_ids() {
        let mut rules = LibraryRules::default();
        rules.ring_closing_pairs.push(("r".to_string(), "r".to_string()));
        let counters = CounterRegistry::new();
        counters.ensure_at_least(crate::counters::CounterKind::Graph, 10);

        let graph = chain("r");
        let FinishOutcome::Alternatives(alts) = finisher(rules).finish(&graph, &counters).unwrap() else {
            panic!("expected ring alternatives");
        };
        assert_eq!(alts.len(), 1);
        assert_eq!(alts[0].id, 11);
        assert_eq!(alts[0].ring_closures.len(), 1);
        assert!(alts[0].free_attachment_points().is_empty());
        assert!(graph.ring_closures.is_empty(), "input must be left untouched");
    }

    #[test]
    fn test_plain_graph_is_single_and_scorable() {
        let outcome = finisher(LibraryRules::default())
            .finish(&chain("z"), &CounterRegistry::new())
            .unwrap();
        assert_eq!(outcome, FinishOutcome::Single { scorable: true });
    }
}
