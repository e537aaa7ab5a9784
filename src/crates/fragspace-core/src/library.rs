//! Building-block library collaborator
//!
//! The library supplies root scaffolds and, for any open attachment point, the
//! ordered list of things that may be attached there. Everything chemistry
//! specific stays behind [`BuildingBlockLibrary`]; the engine only sees block
//! references, attachment point classes and a handful of rules.

use crate::error::{ExplorerError, Result};
use crate::graph::{AttachmentPoint, BlockKind, BlockRef, Vertex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// What to do with one open attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    /// Attach `block` through its attachment point `ap`
    Attach { block: BlockRef, ap: usize },
    /// Leave the attachment point free
    Empty,
}

impl Choice {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// A reusable block: scaffold, fragment or capping group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingBlock {
    pub name: String,
    /// Attachment point classes, by index
    pub attachment_points: Vec<String>,
    #[serde(default)]
    pub symmetric_ap_sets: Vec<Vec<usize>>,
}

impl BuildingBlock {
    pub fn new(name: impl Into<String>, attachment_points: &[&str]) -> Self {
        Self {
            name: name.into(),
            attachment_points: attachment_points.iter().map(|c| c.to_string()).collect(),
            symmetric_ap_sets: Vec::new(),
        }
    }

    pub fn with_symmetric_ap_sets(mut self, sets: Vec<Vec<usize>>) -> Self {
        self.symmetric_ap_sets = sets;
        self
    }
}

/// Compatibility and completion rules between attachment point classes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryRules {
    /// Source class -> target classes it may bind to
    pub compatibility: HashMap<String, Vec<String>>,
    /// Source class -> class of the capping group that closes it
    pub capping: HashMap<String, String>,
    /// Classes that must not stay free in a finished graph
    pub forbidden_ends: HashSet<String>,
    /// Classes whose symmetric attachment points are grown identically
    pub symmetric_classes: HashSet<String>,
    /// Class pairs that may close a ring with each other
    pub ring_closing_pairs: Vec<(String, String)>,
}

pub trait BuildingBlockLibrary: Send + Sync {
    /// Look up a block
    fn block(&self, block: BlockRef) -> Result<&BuildingBlock>;

    /// Number of blocks of `kind`
    fn count(&self, kind: BlockKind) -> usize;

    /// Ordered candidates for a free attachment point of class `class`
    ///
    /// Compatible fragments come first, then capping groups when the class has
    /// a capping rule, otherwise the empty choice unless the class is a
    /// forbidden end.
    fn candidates_for(&self, class: &str) -> Vec<Choice>;

    fn capping_class(&self, class: &str) -> Option<&str>;

    fn is_forbidden_end(&self, class: &str) -> bool;

    /// Whether symmetric attachment points of `class` must be grown alike
    fn imposes_symmetry(&self, class: &str) -> bool;

    fn can_close_ring(&self, a: &str, b: &str) -> bool;

    /// Build a vertex for `block` with all attachment points free
    fn instantiate(&self, block: BlockRef, vertex_id: u64, level: i32) -> Result<Vertex> {
        let bb = self.block(block)?;
        Ok(Vertex::new(
            vertex_id,
            block,
            bb.attachment_points.iter().map(AttachmentPoint::new).collect(),
            level,
        )
        .with_symmetric_ap_sets(bb.symmetric_ap_sets.clone()))
    }
}

/// Library held entirely in memory, loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryLibrary {
    pub scaffolds: Vec<BuildingBlock>,
    pub fragments: Vec<BuildingBlock>,
    pub caps: Vec<BuildingBlock>,
    pub rules: LibraryRules,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scaffold(mut self, block: BuildingBlock) -> Self {
        self.scaffolds.push(block);
        self
    }

    pub fn with_fragment(mut self, block: BuildingBlock) -> Self {
        self.fragments.push(block);
        self
    }

    pub fn with_cap(mut self, block: BuildingBlock) -> Self {
        self.caps.push(block);
        self
    }

    pub fn with_rules(mut self, rules: LibraryRules) -> Self {
        self.rules = rules;
        self
    }

    /// Read a library from a JSON file
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            ExplorerError::Library(format!("cannot read library {}: {}", path.display(), e))
        })?;
        let library: Self = serde_json::from_str(&text)?;
        library.check()?;
        Ok(library)
    }

    /// Reject rules that reference nothing usable
    pub fn check(&self) -> Result<()> {
        for (kind, blocks) in [
            ("scaffold", &self.scaffolds),
            ("fragment", &self.fragments),
            ("capping group", &self.caps),
        ] {
            for (i, bb) in blocks.iter().enumerate() {
                for set in &bb.symmetric_ap_sets {
                    if let Some(bad) = set.iter().find(|ap| **ap >= bb.attachment_points.len()) {
                        return Err(ExplorerError::Library(format!(
                            "{} {} ({}) declares symmetric attachment point {} but has only {}",
                            kind,
                            i,
                            bb.name,
                            bad,
                            bb.attachment_points.len()
                        )));
                    }
                }
            }
        }
        for (i, cap) in self.caps.iter().enumerate() {
            if cap.attachment_points.len() != 1 {
                return Err(ExplorerError::Library(format!(
                    "capping group {} ({}) must have exactly one attachment point",
                    i, cap.name
                )));
            }
        }
        Ok(())
    }

    fn blocks(&self, kind: BlockKind) -> &[BuildingBlock] {
        match kind {
            BlockKind::Scaffold => &self.scaffolds,
            BlockKind::Fragment => &self.fragments,
            BlockKind::Cap => &self.caps,
        }
    }
}

impl BuildingBlockLibrary for InMemoryLibrary {
    fn block(&self, block: BlockRef) -> Result<&BuildingBlock> {
        self.blocks(block.kind).get(block.index).ok_or_else(|| {
            ExplorerError::Library(format!("no {:?} block with index {}", block.kind, block.index))
        })
    }

    fn count(&self, kind: BlockKind) -> usize {
        self.blocks(kind).len()
    }

    fn candidates_for(&self, class: &str) -> Vec<Choice> {
        let mut out = Vec::new();
        if let Some(targets) = self.rules.compatibility.get(class) {
            for (index, bb) in self.fragments.iter().enumerate() {
                for (ap, ap_class) in bb.attachment_points.iter().enumerate() {
                    if targets.iter().any(|t| t == ap_class) {
                        out.push(Choice::Attach {
                            block: BlockRef::fragment(index),
                            ap,
                        });
                    }
                }
            }
        }

        match self.capping_class(class) {
            Some(cap_class) => {
                for (index, cap) in self.caps.iter().enumerate() {
                    if cap.attachment_points.first().map(String::as_str) == Some(cap_class) {
                        out.push(Choice::Attach {
                            block: BlockRef::cap(index),
                            ap: 0,
                        });
                    }
                }
            }
            None if !self.is_forbidden_end(class) => out.push(Choice::Empty),
            None => {}
        }
        out
    }

    fn capping_class(&self, class: &str) -> Option<&str> {
        self.rules.capping.get(class).map(String::as_str)
    }

    fn is_forbidden_end(&self, class: &str) -> bool {
        self.rules.forbidden_ends.contains(class)
    }

    fn imposes_symmetry(&self, class: &str) -> bool {
        self.rules.symmetric_classes.contains(class)
    }

    fn can_close_ring(&self, a: &str, b: &str) -> bool {
        self.rules
            .ring_closing_pairs
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}
