use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct Entry {
    task_id: String,
    priority: i64,
}

/// Ordered set of pending task ids.
///
/// Sorted by descending priority; ids with equal priority keep the order in
/// which they were inserted. Insertion is a linear scan, which is fine for
/// the modest depths the scheduler sees.
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: VecDeque<Entry>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Insert an id before the first queued id with a strictly lower priority.
    pub fn insert(&mut self, task_id: impl Into<String>, priority: i64) {
        let index = self
            .entries
            .iter()
            .position(|e| priority > e.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            index,
            Entry {
                task_id: task_id.into(),
                priority,
            },
        );
    }

    /// Remove and return the highest-priority id.
    pub fn pop_front(&mut self) -> Option<String> {
        self.entries.pop_front().map(|e| e.task_id)
    }

    /// Remove an id if it is queued. Returns whether it was present.
    pub fn remove_if_present(&mut self, task_id: &str) -> bool {
        match self.entries.iter().position(|e| e.task_id == task_id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Keep only the ids for which `keep` returns true. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| keep(&e.task_id));
        before - self.entries.len()
    }

    /// Queued ids in dispatch order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.task_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
