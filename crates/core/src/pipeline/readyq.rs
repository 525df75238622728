//! The ready instruction queue.
//!
//! Holds operations whose register dependencies are satisfied, in issue
//! priority order: memory, long-latency, and control operations go to the
//! head (they are most likely on the critical path); everything else is
//! ordered oldest-sequence-first. The queue is fully drained and rebuilt
//! around every issue pass — operations that fail to acquire a functional
//! unit are re-enqueued through the normal policy, which keeps the ordering
//! exact across cycles.

use crate::pipeline::rslink::EntryRef;

/// One ready-queue node.
#[derive(Debug, Clone, Copy)]
pub struct ReadyNode {
    /// The ready operation.
    pub target: EntryRef,
    /// Its program-order sequence number.
    pub seq: u64,
}

/// Priority-ordered list of register-ready operations.
#[derive(Default)]
pub struct ReadyQueue {
    nodes: Vec<ReadyNode>,
}

impl ReadyQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued nodes (stale ones included until drained).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a node. `critical` operations (memory, long-latency, control)
    /// go to the head; others are placed in sequence order after any earlier
    /// sequences already present.
    pub fn insert(&mut self, target: EntryRef, seq: u64, critical: bool) {
        let pos = if critical {
            0
        } else {
            self.nodes
                .iter()
                .position(|n| n.seq >= seq)
                .unwrap_or(self.nodes.len())
        };
        self.nodes.insert(pos, ReadyNode { target, seq });
    }

    /// Removes and returns the whole list for an issue pass.
    pub fn drain_all(&mut self) -> Vec<ReadyNode> {
        std::mem::take(&mut self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::rslink::Queue;

    fn r(idx: usize) -> EntryRef {
        EntryRef {
            queue: Queue::Ruu,
            index: idx,
            tag: 0,
        }
    }

    #[test]
    fn test_sequence_order() {
        let mut q = ReadyQueue::new();
        q.insert(r(0), 5, false);
        q.insert(r(1), 3, false);
        q.insert(r(2), 9, false);
        let order: Vec<u64> = q.drain_all().iter().map(|n| n.seq).collect();
        assert_eq!(order, vec![3, 5, 9]);
    }

    #[test]
    fn test_critical_ops_jump_the_queue() {
        let mut q = ReadyQueue::new();
        q.insert(r(0), 1, false);
        q.insert(r(1), 2, false);
        q.insert(r(2), 50, true);
        let order: Vec<u64> = q.drain_all().iter().map(|n| n.seq).collect();
        assert_eq!(order, vec![50, 1, 2]);
    }

    #[test]
    fn test_drain_empties() {
        let mut q = ReadyQueue::new();
        q.insert(r(0), 1, false);
        assert_eq!(q.drain_all().len(), 1);
        assert!(q.is_empty());
    }
}
