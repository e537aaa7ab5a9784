//! Process-wide id sequences shared by every worker
//!
//! The registry is an explicit object handed to whatever allocates ids, never
//! hidden static state. Each sequence is a single atomic `fetch_add`, so no
//! two callers can ever observe the same id. After a restart the registry is
//! reseeded from the checkpoint's [`CounterSnapshot`].

use fragspace_checkpoint::CounterSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which sequence to draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Graph,
    Vertex,
    Candidate,
}

/// Atomic monotonic id generators
#[derive(Debug, Default)]
pub struct CounterRegistry {
    graph: AtomicU64,
    vertex: AtomicU64,
    candidate: AtomicU64,
}

impl CounterRegistry {
    /// A registry whose first id for every sequence is 1
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry continuing after the values in `snapshot`
    pub fn from_snapshot(snapshot: CounterSnapshot) -> Self {
        Self {
            graph: AtomicU64::new(snapshot.graph),
            vertex: AtomicU64::new(snapshot.vertex),
            candidate: AtomicU64::new(snapshot.candidate),
        }
    }

    fn slot(&self, kind: CounterKind) -> &AtomicU64 {
        match kind {
            CounterKind::Graph => &self.graph,
            CounterKind::Vertex => &self.vertex,
            CounterKind::Candidate => &self.candidate,
        }
    }

    /// Allocate the next id of `kind`
    pub fn next(&self, kind: CounterKind) -> u64 {
        self.slot(kind).fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn next_graph_id(&self) -> u64 {
        self.next(CounterKind::Graph)
    }

    pub fn next_vertex_id(&self) -> u64 {
        self.next(CounterKind::Vertex)
    }

    pub fn next_candidate_id(&self) -> u64 {
        self.next(CounterKind::Candidate)
    }

    /// Last id handed out for `kind` (0 if none)
    pub fn current(&self, kind: CounterKind) -> u64 {
        self.slot(kind).load(Ordering::SeqCst)
    }

    /// Raise a sequence so it never hands out `floor` or anything below
    ///
    /// Used when ids are read back from storage (for instance user supplied
    /// roots) and the sequence must move past them. Never lowers a counter.
    pub fn ensure_at_least(&self, kind: CounterKind, floor: u64) {
        self.slot(kind).fetch_max(floor, Ordering::SeqCst);
    }

    /// Overwrite all sequences with the values in `snapshot`
    pub fn reseed(&self, snapshot: CounterSnapshot) {
        self.graph.store(snapshot.graph, Ordering::SeqCst);
        self.vertex.store(snapshot.vertex, Ordering::SeqCst);
        self.candidate.store(snapshot.candidate, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            graph: self.current(CounterKind::Graph),
            vertex: self.current(CounterKind::Vertex),
            candidate: self.current(CounterKind::Candidate),
        }
    }
}
