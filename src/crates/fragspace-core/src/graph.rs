//! Graph model for grown candidates
//!
//! Graphs are an arena of [`Vertex`] values with index-based [`Edge`]s, so a
//! structural clone is just `Clone` and never needs to remap anything. The only
//! operation that does remap is [`Graph::renumbered`], which moves a graph read
//! from outside the run into this run's vertex id space.

use crate::counters::CounterRegistry;
use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Index of a vertex inside its graph's arena
pub type VertexIdx = usize;

/// Kind of building block a vertex was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Scaffold,
    Fragment,
    Cap,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Scaffold => "S",
            Self::Fragment => "F",
            Self::Cap => "C",
        };
        f.write_str(tag)
    }
}

/// Reference to a block of the building-block library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub kind: BlockKind,
    pub index: usize,
}

impl BlockRef {
    pub fn scaffold(index: usize) -> Self {
        Self { kind: BlockKind::Scaffold, index }
    }

    pub fn fragment(index: usize) -> Self {
        Self { kind: BlockKind::Fragment, index }
    }

    pub fn cap(index: usize) -> Self {
        Self { kind: BlockKind::Cap, index }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.index)
    }
}

/// Open or used connection point on a vertex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPoint {
    /// Attachment point class, drives compatibility
    pub class: String,
    /// Id of the vertex on the other side, when used
    #[serde(default)]
    pub user: Option<u64>,
}

impl AttachmentPoint {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            user: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.user.is_none()
    }
}

/// Location of an attachment point inside a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApRef {
    pub vertex: VertexIdx,
    pub ap: usize,
}

impl ApRef {
    pub fn new(vertex: VertexIdx, ap: usize) -> Self {
        Self { vertex, ap }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: u64,
    pub block: BlockRef,
    pub attachment_points: Vec<AttachmentPoint>,
    /// Sets of attachment point indices related by symmetry
    #[serde(default)]
    pub symmetric_ap_sets: Vec<Vec<usize>>,
    /// Growth level the vertex was added at (-1 for scaffolds)
    pub level: i32,
}

impl Vertex {
    pub fn new(id: u64, block: BlockRef, attachment_points: Vec<AttachmentPoint>, level: i32) -> Self {
        Self {
            id,
            block,
            attachment_points,
            symmetric_ap_sets: Vec::new(),
            level,
        }
    }

    pub fn with_symmetric_ap_sets(mut self, sets: Vec<Vec<usize>>) -> Self {
        self.symmetric_ap_sets = sets;
        self
    }

    /// Indices of the free attachment points, in order
    pub fn free_aps(&self) -> impl Iterator<Item = usize> + '_ {
        self.attachment_points
            .iter()
            .enumerate()
            .filter(|(_, ap)| ap.is_free())
            .map(|(i, _)| i)
    }

    /// Symmetric set containing attachment point `ap`, if any
    pub fn symmetric_ap_set_of(&self, ap: usize) -> Option<&[usize]> {
        self.symmetric_ap_sets
            .iter()
            .find(|set| set.contains(&ap))
            .map(|set| set.as_slice())
    }
}

/// Connection between two attachment points, by arena index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: ApRef,
    pub target: ApRef,
}

/// Ring closure between two otherwise free attachment points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingClosure {
    pub first: ApRef,
    pub second: ApRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub id: u64,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    /// Sets of vertex ids related by symmetry
    #[serde(default)]
    pub symmetric_vertex_sets: Vec<Vec<u64>>,
    #[serde(default)]
    pub ring_closures: Vec<RingClosure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Graph {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            vertices: Vec::new(),
            edges: Vec::new(),
            symmetric_vertex_sets: Vec::new(),
            ring_closures: Vec::new(),
            note: None,
        }
    }

    /// Append a vertex and return its arena index
    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexIdx {
        self.vertices.push(vertex);
        self.vertices.len() - 1
    }

    pub fn vertex(&self, idx: VertexIdx) -> Result<&Vertex> {
        self.vertices
            .get(idx)
            .ok_or_else(|| ExplorerError::Graph(format!("graph {} has no vertex at index {}", self.id, idx)))
    }

    pub fn vertex_index(&self, vertex_id: u64) -> Option<VertexIdx> {
        self.vertices.iter().position(|v| v.id == vertex_id)
    }

    pub fn attachment_point(&self, at: ApRef) -> Result<&AttachmentPoint> {
        self.vertex(at.vertex)?.attachment_points.get(at.ap).ok_or_else(|| {
            ExplorerError::Graph(format!(
                "vertex at index {} of graph {} has no attachment point {}",
                at.vertex, self.id, at.ap
            ))
        })
    }

    fn attachment_point_mut(&mut self, at: ApRef) -> Result<&mut AttachmentPoint> {
        let graph_id = self.id;
        self.vertices
            .get_mut(at.vertex)
            .and_then(|v| v.attachment_points.get_mut(at.ap))
            .ok_or_else(|| {
                ExplorerError::Graph(format!(
                    "graph {} has no attachment point {} on vertex index {}",
                    graph_id, at.ap, at.vertex
                ))
            })
    }

    pub fn is_free(&self, at: ApRef) -> Result<bool> {
        Ok(self.attachment_point(at)?.is_free())
    }

    fn occupy(&mut self, a: ApRef, b: ApRef) -> Result<()> {
        if a.vertex == b.vertex {
            return Err(ExplorerError::Graph(format!(
                "cannot connect vertex index {} to itself",
                a.vertex
            )));
        }
        for at in [a, b] {
            if !self.is_free(at)? {
                return Err(ExplorerError::Graph(format!(
                    "attachment point {} of vertex {} is already used",
                    at.ap,
                    self.vertices[at.vertex].id
                )));
            }
        }
        let (a_id, b_id) = (self.vertices[a.vertex].id, self.vertices[b.vertex].id);
        self.attachment_point_mut(a)?.user = Some(b_id);
        self.attachment_point_mut(b)?.user = Some(a_id);
        Ok(())
    }

    /// Create an edge between two free attachment points
    pub fn connect(&mut self, source: ApRef, target: ApRef) -> Result<()> {
        self.occupy(source, target)?;
        self.edges.push(Edge { source, target });
        Ok(())
    }

    /// Close a ring between two free attachment points
    pub fn close_ring(&mut self, first: ApRef, second: ApRef) -> Result<()> {
        self.occupy(first, second)?;
        self.ring_closures.push(RingClosure { first, second });
        Ok(())
    }

    /// True when an edge joins the two vertices directly
    pub fn are_adjacent(&self, a: VertexIdx, b: VertexIdx) -> bool {
        self.edges.iter().any(|e| {
            (e.source.vertex == a && e.target.vertex == b) || (e.source.vertex == b && e.target.vertex == a)
        })
    }

    /// Free attachment points in vertex order, then attachment point order
    pub fn free_attachment_points(&self) -> Vec<ApRef> {
        self.vertices
            .iter()
            .enumerate()
            .flat_map(|(vi, v)| v.free_aps().map(move |ap| ApRef::new(vi, ap)))
            .collect()
    }

    /// Declare a set of vertices related by symmetry
    ///
    /// Sets with fewer than two members carry no information and are ignored.
    pub fn add_symmetric_vertex_set(&mut self, vertex_ids: Vec<u64>) {
        if vertex_ids.len() > 1 {
            self.symmetric_vertex_sets.push(vertex_ids);
        }
    }

    pub fn symmetric_vertex_set_of(&self, vertex_id: u64) -> Option<&[u64]> {
        self.symmetric_vertex_sets
            .iter()
            .find(|set| set.contains(&vertex_id))
            .map(|set| set.as_slice())
    }

    /// Structural check for graphs read from outside the run
    ///
    /// Every edge and ring closure must point at an existing attachment point,
    /// and every symmetry declaration must resolve. Vertex ids must be unique.
    pub fn check(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.vertices.len());
        for vertex in &self.vertices {
            if !seen.insert(vertex.id) {
                return Err(ExplorerError::Graph(format!(
                    "graph {} has more than one vertex with id {}",
                    self.id, vertex.id
                )));
            }
        }
        for vertex in &self.vertices {
            let bad = vertex
                .symmetric_ap_sets
                .iter()
                .flatten()
                .find(|ap| **ap >= vertex.attachment_points.len());
            if let Some(ap) = bad {
                return Err(ExplorerError::Graph(format!(
                    "vertex {} of graph {} declares symmetric attachment point {} but has only {}",
                    vertex.id,
                    self.id,
                    ap,
                    vertex.attachment_points.len()
                )));
            }
        }
        if let Some(unknown) = self.symmetric_vertex_sets.iter().flatten().find(|id| !seen.contains(*id)) {
            return Err(ExplorerError::Graph(format!(
                "graph {} lists unknown vertex {} as symmetric",
                self.id, unknown
            )));
        }
        let edge_ends = self.edges.iter().flat_map(|e| [e.source, e.target]);
        let ring_ends = self.ring_closures.iter().flat_map(|r| [r.first, r.second]);
        for at in edge_ends.chain(ring_ends) {
            self.attachment_point(at)?;
        }
        Ok(())
    }

    /// Highest vertex id in use, 0 for an empty graph
    pub fn max_vertex_id(&self) -> u64 {
        self.vertices.iter().map(|v| v.id).max().unwrap_or(0)
    }

    /// Copy of this graph with fresh graph and vertex ids
    ///
    /// Edges and ring closures address vertices by arena index and stay valid;
    /// attachment point users and symmetric vertex sets are rewritten.
    pub fn renumbered(&self, graph_id: u64, counters: &CounterRegistry) -> Graph {
        let mapping: HashMap<u64, u64> = self
            .vertices
            .iter()
            .map(|v| (v.id, counters.next_vertex_id()))
            .collect();

        let mut copy = self.clone();
        copy.id = graph_id;
        for vertex in &mut copy.vertices {
            vertex.id = mapping[&vertex.id];
            for ap in &mut vertex.attachment_points {
                ap.user = ap.user.and_then(|old| mapping.get(&old).copied());
            }
        }
        copy.symmetric_vertex_sets = self
            .symmetric_vertex_sets
            .iter()
            .map(|set| set.iter().filter_map(|old| mapping.get(old).copied()).collect())
            .collect();
        copy
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Unresolved arena indices print as '?' rather than panicking
        let vid = |at: ApRef| {
            self.vertices
                .get(at.vertex)
                .map_or_else(|| "?".to_string(), |v| v.id.to_string())
        };
        write!(f, "{} ", self.id)?;
        for (i, v) in self.vertices.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}_{}_{}", v.id, v.block, v.level)?;
        }
        f.write_str(" ")?;
        for (i, e) in self.edges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(
                f,
                "{}_{}-{}_{}",
                vid(e.source),
                e.source.ap,
                vid(e.target),
                e.target.ap
            )?;
        }
        if !self.ring_closures.is_empty() {
            f.write_str(" RC")?;
            for r in &self.ring_closures {
                write!(
                    f,
                    " {}_{}~{}_{}",
                    vid(r.first),
                    r.first.ap,
                    vid(r.second),
                    r.second.ap
                )?;
            }
        }
        if !self.symmetric_vertex_sets.is_empty() {
            f.write_str(" SymVertices")?;
            for set in &self.symmetric_vertex_sets {
                write!(f, " {:?}", set)?;
            }
        }
        Ok(())
    }
}
