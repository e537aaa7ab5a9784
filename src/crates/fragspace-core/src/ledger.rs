//! Bookkeeping of the tasks submitted for one level
//!
//! Tasks complete out of order, but a checkpoint may only describe a prefix of
//! the submission order in which every task has completed. The ledger tracks
//! that prefix incrementally:
//!
//! ```text
//! submitted  t1 t2 t3 t4 t5
//! status     ok ok -- ok --
//!            └────┘ safe prefix ends at t2 even though t4 is done
//! ```

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Pending,
    Done { graph_ids: Vec<u64> },
    Failed,
}

#[derive(Debug, Clone)]
struct Entry {
    task_id: u64,
    root_id: u64,
    next_cursor: Vec<usize>,
    status: Status,
}

/// End of the completed prefix, enough to write a checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePoint {
    pub root_id: u64,
    pub next_cursor: Vec<usize>,
    /// Largest candidate id produced by the prefix
    pub last_safe_graph_id: u64,
    /// Number of tasks in the prefix
    pub tasks: usize,
}

#[derive(Debug, Default)]
pub struct TaskLedger {
    entries: Vec<Entry>,
    positions: HashMap<u64, usize>,
    prefix_len: usize,
    prefix_max_graph_id: Option<u64>,
    completed: usize,
    failed: usize,
    reported_candidates: usize,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted task, in submission order
    pub fn register(&mut self, task_id: u64, root_id: u64, next_cursor: Vec<usize>) {
        self.positions.insert(task_id, self.entries.len());
        self.entries.push(Entry {
            task_id,
            root_id,
            next_cursor,
            status: Status::Pending,
        });
    }

    /// Mark a task completed with the candidates it stored
    ///
    /// Returns false when the task is unknown or already settled.
    pub fn complete(&mut self, task_id: u64, graph_ids: Vec<u64>) -> bool {
        let Some(pos) = self.positions.get(&task_id).copied() else {
            return false;
        };
        let entry = &mut self.entries[pos];
        if entry.status != Status::Pending {
            return false;
        }
        self.reported_candidates += graph_ids.len();
        entry.status = Status::Done { graph_ids };
        self.completed += 1;
        self.extend_prefix();
        true
    }

    pub fn fail(&mut self, task_id: u64) -> bool {
        let Some(pos) = self.positions.get(&task_id).copied() else {
            return false;
        };
        let entry = &mut self.entries[pos];
        if entry.status != Status::Pending {
            return false;
        }
        entry.status = Status::Failed;
        self.failed += 1;
        true
    }

    fn extend_prefix(&mut self) {
        while let Some(entry) = self.entries.get(self.prefix_len) {
            let Status::Done { graph_ids } = &entry.status else {
                break;
            };
            if let Some(max) = graph_ids.iter().copied().max() {
                self.prefix_max_graph_id = Some(self.prefix_max_graph_id.map_or(max, |m| m.max(max)));
            }
            self.prefix_len += 1;
        }
    }

    /// Where a checkpoint may point right now, if anywhere
    pub fn safe_point(&self) -> Option<SafePoint> {
        let last = self.entries.get(self.prefix_len.checked_sub(1)?)?;
        Some(SafePoint {
            root_id: last.root_id,
            next_cursor: last.next_cursor.clone(),
            last_safe_graph_id: self.prefix_max_graph_id?,
            tasks: self.prefix_len,
        })
    }

    pub fn submitted(&self) -> usize {
        self.entries.len()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Tasks neither completed nor failed
    pub fn outstanding(&self) -> usize {
        self.entries.len() - self.completed - self.failed
    }

    pub fn all_completed(&self) -> bool {
        self.completed == self.entries.len()
    }

    /// Sum of candidates reported by completed tasks
    pub fn reported_candidates(&self) -> usize {
        self.reported_candidates
    }

    /// Ids of the tasks still pending, in submission order
    pub fn pending_tasks(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|e| e.status == Status::Pending)
            .map(|e| e.task_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(n: u64) -> TaskLedger {
        let mut ledger = TaskLedger::new();
        for t in 1..=n {
            ledger.register(t, 7, vec![t as usize]);
        }
        ledger
    }

    #[test]
    fn test_no_safe_point_until_first_task_done() {
        let mut ledger = ledger(3);
        assert!(ledger.safe_point().is_none());
        ledger.complete(2, vec![11]);
        assert!(ledger.safe_point().is_none());
    }

    #[test]
    fn test_prefix_stops_at_first_pending_task() {
        let mut ledger = ledger(5);
        ledger.complete(1, vec![10]);
        ledger.complete(2, vec![12]);
        ledger.complete(4, vec![11]);

        let safe = ledger.safe_point().unwrap();
        assert_eq!(safe.tasks, 2);
        assert_eq!(safe.next_cursor, vec![2]);
        assert_eq!(safe.last_safe_graph_id, 12);

        ledger.complete(3, vec![13, 15]);
        let safe = ledger.safe_point().unwrap();
        assert_eq!(safe.tasks, 4);
        assert_eq!(safe.next_cursor, vec![4]);
        assert_eq!(safe.last_safe_graph_id, 15);
    }

    #[test]
    fn test_counts() {
        let mut ledger = ledger(3);
        ledger.complete(1, vec![4, 5]);
        ledger.fail(3);
        assert!(!ledger.complete(1, vec![6]), "settled tasks stay settled");
        assert!(!ledger.complete(99, vec![]));

        assert_eq!(ledger.submitted(), 3);
        assert_eq!(ledger.completed(), 1);
        assert_eq!(ledger.failed(), 1);
        assert_eq!(ledger.outstanding(), 1);
        assert_eq!(ledger.reported_candidates(), 2);
        assert_eq!(ledger.pending_tasks(), vec![2]);
        assert!(!ledger.all_completed());
    }
}
