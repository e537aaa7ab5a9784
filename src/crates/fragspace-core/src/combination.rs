//! Enumeration of the ways a root graph can grow by one layer
//!
//! Every free attachment point that admits at least one [`Choice`] is an
//! *active point*. A combination picks one choice per active point; the
//! iterator walks all of them like an odometer whose first digit is the most
//! significant and whose last digit turns fastest:
//!
//! ```text
//! sizes  [2, 3]
//! cursor [0,0] [0,1] [0,2] [1,0] [1,1] [1,2]  -> exhausted at [2,0]
//! ```
//!
//! The cursor stored after a combination is the cursor of the *next* one, so a
//! run resumed with [`CombinationIterator::resume_from`] produces exactly the
//! tail that a fresh iterator would produce after the same number of steps.
//!
//! With symmetry enforcement on, only one representative of each set of
//! symmetric attachment points (or symmetric vertices) becomes an active point.
//! Its choice is projected onto every free symmetric counterpart, so k
//! symmetric points with n candidates yield n combinations rather than n^k.
//! Symmetric vertices are represented by the first member of their set: the
//! other members contribute only the points that mirror a free point of the
//! representative.

use crate::error::{ExplorerError, Result};
use crate::graph::{ApRef, Graph};
use crate::library::{BuildingBlockLibrary, Choice};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One attachment point of the root and what goes on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub source: ApRef,
    pub choice: Choice,
    /// Index of the active point this assignment belongs to; vertices added
    /// for the same group are symmetric siblings
    pub symmetry_group: usize,
}

/// A full assignment of choices to the active points of a root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    pub assignments: Vec<Assignment>,
    /// Cursor this combination was produced at
    pub cursor: Vec<usize>,
    /// Cursor of the combination that follows it
    pub next_cursor: Vec<usize>,
}

impl Combination {
    /// Assignments that attach something
    pub fn attachments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(|a| !a.choice.is_empty())
    }
}

#[derive(Debug, Clone)]
struct ActivePoint {
    /// Representative first, then its symmetric counterparts
    members: Vec<ApRef>,
    candidates: Vec<Choice>,
}

#[derive(Debug, Clone)]
pub struct CombinationIterator {
    points: Vec<ActivePoint>,
    cursor: Vec<usize>,
    total: u64,
    generated: u64,
}

impl CombinationIterator {
    /// Build the enumeration space of `root`
    pub fn new(root: &Graph, library: &dyn BuildingBlockLibrary, enforce_symmetry: bool) -> Result<Self> {
        let points = collect_active_points(root, library, enforce_symmetry)?;
        let total = if points.is_empty() {
            0
        } else {
            points
                .iter()
                .fold(1u64, |acc, p| acc.saturating_mul(p.candidates.len() as u64))
        };
        let cursor = vec![0; points.len()];
        Ok(Self {
            points,
            cursor,
            total,
            generated: 0,
        })
    }

    /// Restart the enumeration at `cursor`
    ///
    /// `cursor` must come from [`current_cursor`](Self::current_cursor) of an
    /// iterator over the same root; the exhausted cursor is accepted and
    /// leaves nothing to iterate.
    pub fn resume_from(&mut self, cursor: &[usize]) -> Result<()> {
        if cursor.len() != self.points.len() {
            return Err(ExplorerError::Enumeration(format!(
                "resume cursor {:?} has {} digits but the root has {} active points",
                cursor,
                cursor.len(),
                self.points.len()
            )));
        }
        if cursor != self.exhausted_cursor().as_slice() {
            for (i, (digit, point)) in cursor.iter().zip(&self.points).enumerate() {
                if *digit >= point.candidates.len() {
                    return Err(ExplorerError::Enumeration(format!(
                        "resume cursor {:?}: digit {} is {} but only {} candidates exist",
                        cursor,
                        i,
                        digit,
                        point.candidates.len()
                    )));
                }
            }
        }
        self.cursor = cursor.to_vec();
        Ok(())
    }

    fn exhausted_cursor(&self) -> Vec<usize> {
        let mut cursor = vec![0; self.points.len()];
        if let Some(first) = cursor.first_mut() {
            *first = self.points[0].candidates.len();
        }
        cursor
    }

    pub fn has_next(&self) -> bool {
        match (self.cursor.first(), self.points.first()) {
            (Some(digit), Some(point)) => *digit < point.candidates.len(),
            _ => false,
        }
    }

    /// Cursor of the next combination to be produced
    pub fn current_cursor(&self) -> &[usize] {
        &self.cursor
    }

    /// Size of the (symmetry reduced) enumeration space
    pub fn total_combinations(&self) -> u64 {
        self.total
    }

    /// Number of candidates of each active point
    pub fn candidate_set_sizes(&self) -> Vec<usize> {
        self.points.iter().map(|p| p.candidates.len()).collect()
    }

    pub fn active_point_count(&self) -> usize {
        self.points.len()
    }

    /// Combinations produced by this iterator instance
    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Ordinal of the current cursor within the whole enumeration
    pub fn position(&self) -> u64 {
        self.cursor
            .iter()
            .zip(&self.points)
            .fold(0u64, |acc, (digit, p)| {
                acc.saturating_mul(p.candidates.len() as u64)
                    .saturating_add(*digit as u64)
            })
    }

    fn advance(&mut self) {
        for i in (0..self.cursor.len()).rev() {
            self.cursor[i] += 1;
            if i == 0 || self.cursor[i] < self.points[i].candidates.len() {
                return;
            }
            self.cursor[i] = 0;
        }
    }
}

impl Iterator for CombinationIterator {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if !self.has_next() {
            return None;
        }
        let cursor = self.cursor.clone();
        let mut assignments = Vec::new();
        for (group, (point, digit)) in self.points.iter().zip(&cursor).enumerate() {
            let choice = point.candidates[*digit];
            assignments.extend(point.members.iter().map(|source| Assignment {
                source: *source,
                choice,
                symmetry_group: group,
            }));
        }
        self.advance();
        self.generated += 1;
        Some(Combination {
            assignments,
            cursor,
            next_cursor: self.cursor.clone(),
        })
    }
}

fn collect_active_points(
    root: &Graph,
    library: &dyn BuildingBlockLibrary,
    enforce_symmetry: bool,
) -> Result<Vec<ActivePoint>> {
    let mut covered: HashSet<ApRef> = HashSet::new();
    let mut points = Vec::new();

    for (vi, vertex) in root.vertices.iter().enumerate() {
        // Symmetric siblings follow the first member of their set. A free
        // point only a sibling still has never becomes active on its own.
        if enforce_symmetry {
            if let Some(set) = root.symmetric_vertex_set_of(vertex.id) {
                if set.first() != Some(&vertex.id) {
                    continue;
                }
            }
        }

        for ap in vertex.free_aps() {
            let source = ApRef::new(vi, ap);
            if covered.contains(&source) {
                continue;
            }
            let class = &vertex.attachment_points[ap].class;

            let mut local = vec![ap];
            if enforce_symmetry && library.imposes_symmetry(class) {
                if let Some(set) = vertex.symmetric_ap_set_of(ap) {
                    local.extend(
                        set.iter()
                            .copied()
                            .filter(|other| {
                                *other != ap && vertex.attachment_points.get(*other).is_some_and(|p| p.is_free())
                            }),
                    );
                }
            }

            let mut members: Vec<ApRef> = local.iter().map(|a| ApRef::new(vi, *a)).collect();
            if enforce_symmetry {
                if let Some(set) = root.symmetric_vertex_set_of(vertex.id) {
                    for sibling_id in set.iter().skip(1) {
                        let sibling = root.vertex_index(*sibling_id).ok_or_else(|| {
                            ExplorerError::Graph(format!(
                                "graph {} lists unknown vertex {} as symmetric",
                                root.id, sibling_id
                            ))
                        })?;
                        for a in &local {
                            let at = ApRef::new(sibling, *a);
                            if root.attachment_point(at)?.is_free() {
                                members.push(at);
                            }
                        }
                    }
                }
            }
            covered.extend(members.iter().copied());

            let candidates = library.candidates_for(class);
            if !candidates.is_empty() {
                points.push(ActivePoint { members, candidates });
            }
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttachmentPoint, BlockRef, Vertex};
    use crate::library::{BuildingBlock, InMemoryLibrary, LibraryRules};

    fn library(symmetric: bool) -> InMemoryLibrary {
        let mut rules = LibraryRules::default();
        rules.compatibility.insert("a".to_string(), vec!["x".to_string(), "y".to_string()]);
        rules.compatibility.insert("b".to_string(), vec!["z".to_string()]);
        rules.forbidden_ends.extend(["a".to_string(), "b".to_string()]);
        if symmetric {
            rules.symmetric_classes.insert("a".to_string());
        }
        InMemoryLibrary::new()
            .with_fragment(BuildingBlock::new("F1", &["x"]))
            .with_fragment(BuildingBlock::new("F2", &["y"]))
            .with_fragment(BuildingBlock::new("F3", &["z"]))
            .with_rules(rules)
    }

    fn root(classes: &[&str], symmetric_aps: Vec<Vec<usize>>) -> Graph {
        let mut g = Graph::new(1);
        g.add_vertex(
            Vertex::new(
                1,
                BlockRef::scaffold(0),
                classes.iter().map(|c| AttachmentPoint::new(*c)).collect(),
                -1,
            )
            .with_symmetric_ap_sets(symmetric_aps),
        );
        g
    }

    #[test]
    fn test_two_points_yield_product() {
        let it = CombinationIterator::new(&root(&["a", "b"], vec![]), &library(false), true).unwrap();
        assert_eq!(it.candidate_set_sizes(), vec![2, 1]);
        assert_eq!(it.total_combinations(), 2);

        let combos: Vec<_> = it.collect();
        assert_eq!(combos.len(), 2);
        assert_eq!(combos[0].cursor, vec![0, 0]);
        assert_eq!(combos[0].next_cursor, vec![1, 0]);
        assert_eq!(combos[1].next_cursor, vec![2, 0]);
        assert_eq!(
            combos[1].assignments[0].choice,
            Choice::Attach { block: BlockRef::fragment(1), ap: 0 }
        );
    }

    #[test]
    fn test_last_digit_turns_fastest() {
        let mut it = CombinationIterator::new(&root(&["a", "a"], vec![]), &library(false), true).unwrap();
        let cursors: Vec<_> = it.by_ref().map(|c| c.cursor).collect();
        assert_eq!(cursors, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
        assert_eq!(it.current_cursor(), &[2, 0]);
        assert_eq!(it.position(), 4);
        assert_eq!(it.generated(), 4);
    }

    #[test]
    fn test_symmetric_points_collapse() {
        let g = root(&["a", "a", "a"], vec![vec![0, 1, 2]]);
        let it = CombinationIterator::new(&g, &library(true), true).unwrap();
        assert_eq!(it.total_combinations(), 2);
        let combos: Vec<_> = it.collect();
        for combo in &combos {
            assert_eq!(combo.assignments.len(), 3);
            assert!(combo.assignments.iter().all(|a| a.choice == combo.assignments[0].choice));
            assert!(combo.assignments.iter().all(|a| a.symmetry_group == 0));
        }

        let plain = CombinationIterator::new(&g, &library(true), false).unwrap();
        assert_eq!(plain.total_combinations(), 8);
    }

    #[test]
    fn test_symmetry_needs_class_rule() {
        let g = root(&["a", "a"], vec![vec![0, 1]]);
        let it = CombinationIterator::new(&g, &library(false), true).unwrap();
        assert_eq!(it.total_combinations(), 4);
    }

    #[test]
    fn test_symmetric_vertices_follow_representative() {
        let mut g = root(&["c", "c"], vec![]);
        let sibling = || Vertex::new(0, BlockRef::fragment(0), vec![AttachmentPoint::new("x"), AttachmentPoint::new("a")], 0);
        g.add_vertex(Vertex { id: 2, ..sibling() });
        g.add_vertex(Vertex { id: 3, ..sibling() });
        g.connect(ApRef::new(0, 0), ApRef::new(1, 0)).unwrap();
        g.connect(ApRef::new(0, 1), ApRef::new(2, 0)).unwrap();
        g.add_symmetric_vertex_set(vec![2, 3]);

        let it = CombinationIterator::new(&g, &library(false), true).unwrap();
        assert_eq!(it.total_combinations(), 2);
        let combo = it.clone().next().unwrap();
        let sources: Vec<_> = combo.assignments.iter().map(|a| a.source).collect();
        assert_eq!(sources, vec![ApRef::new(1, 1), ApRef::new(2, 1)]);

        let plain = CombinationIterator::new(&g, &library(false), false).unwrap();
        assert_eq!(plain.total_combinations(), 4);
    }

    #[test]
    fn test_point_free_only_on_sibling_stays_inactive() {
        let mut g = root(&["c", "c"], vec![]);
        let sibling = || Vertex::new(0, BlockRef::fragment(0), vec![AttachmentPoint::new("x"), AttachmentPoint::new("a")], 0);
        g.add_vertex(Vertex { id: 2, ..sibling() });
        g.add_vertex(Vertex { id: 3, ..sibling() });
        g.connect(ApRef::new(0, 0), ApRef::new(1, 0)).unwrap();
        g.connect(ApRef::new(0, 1), ApRef::new(2, 0)).unwrap();
        g.add_symmetric_vertex_set(vec![2, 3]);
        // Representative's point taken, as after a one-sided ring closure
        g.vertices[1].attachment_points[1].user = Some(99);

        let it = CombinationIterator::new(&g, &library(false), true).unwrap();
        assert_eq!(it.active_point_count(), 0);

        let plain = CombinationIterator::new(&g, &library(false), false).unwrap();
        assert_eq!(plain.active_point_count(), 1);
        assert_eq!(plain.candidate_set_sizes(), vec![2]);
    }

    #[test]
    fn test_resume_reproduces_tail() {
        let g = root(&["a", "a", "b"], vec![]);
        let lib = library(false);
        let mut fresh = CombinationIterator::new(&g, &lib, true).unwrap();
        fresh.next();
        fresh.next();
        let cursor = fresh.current_cursor().to_vec();

        let mut resumed = CombinationIterator::new(&g, &lib, true).unwrap();
        resumed.resume_from(&cursor).unwrap();
        assert_eq!(resumed.position(), 2);
        assert_eq!(fresh.collect::<Vec<_>>(), resumed.collect::<Vec<_>>());
    }

    #[test]
    fn test_resume_rejects_bad_cursor() {
        let g = root(&["a", "b"], vec![]);
        let mut it = CombinationIterator::new(&g, &library(false), true).unwrap();
        assert!(matches!(it.resume_from(&[0]), Err(ExplorerError::Enumeration(_))));
        assert!(matches!(it.resume_from(&[0, 1]), Err(ExplorerError::Enumeration(_))));
        it.resume_from(&[2, 0]).unwrap();
        assert!(!it.has_next());
    }

    #[test]
    fn test_root_without_active_points_is_empty() {
        let g = root(&[], vec![]);
        let mut it = CombinationIterator::new(&g, &library(false), true).unwrap();
        assert_eq!(it.total_combinations(), 0);
        assert!(it.next().is_none());
        it.resume_from(&[]).unwrap();
    }
}
