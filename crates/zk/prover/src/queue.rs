use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::errors::ProverError;

/// Priority FIFO over task ids: higher priority first, insertion order
/// within a priority. Bounded; a full queue rejects at submit time.
pub(crate) struct TaskQueue {
    entries: Mutex<BinaryHeap<QueueEntry>>,
    capacity: usize,
    sequence: AtomicU64,
    notify: Notify,
}

#[derive(Debug, PartialEq, Eq)]
struct QueueEntry {
    priority: u8,
    sequence: u64,
    task_id: String,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then(other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl TaskQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(BinaryHeap::new()),
            capacity,
            sequence: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub(crate) fn push(&self, priority: u8, task_id: String) -> Result<(), ProverError> {
        {
            let mut entries = self.entries.lock();
            if entries.len() >= self.capacity {
                return Err(ProverError::QueueFull);
            }
            entries.push(QueueEntry {
                priority,
                sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
                task_id,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Wait until an entry is available and pop the highest-priority one.
    pub(crate) async fn pop(&self) -> String {
        loop {
            if let Some(entry) = self.entries.lock().pop() {
                return entry.task_id;
            }
            self.notify.notified().await;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_higher_priority_pops_first() {
        let queue = TaskQueue::new(8);
        queue.push(0, "low".to_string()).unwrap();
        queue.push(9, "high".to_string()).unwrap();
        queue.push(5, "mid".to_string()).unwrap();

        assert_eq!(queue.pop().await, "high");
        assert_eq!(queue.pop().await, "mid");
        assert_eq!(queue.pop().await, "low");
    }

    #[tokio::test]
    async fn test_fifo_within_priority() {
        let queue = TaskQueue::new(8);
        queue.push(3, "first".to_string()).unwrap();
        queue.push(3, "second".to_string()).unwrap();
        queue.push(3, "third".to_string()).unwrap();

        assert_eq!(queue.pop().await, "first");
        assert_eq!(queue.pop().await, "second");
        assert_eq!(queue.pop().await, "third");
    }

    #[test]
    fn test_full_queue_rejects() {
        let queue = TaskQueue::new(1);
        queue.push(0, "a".to_string()).unwrap();
        assert!(matches!(
            queue.push(0, "b".to_string()),
            Err(ProverError::QueueFull)
        ));
    }
}
