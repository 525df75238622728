//! The completion event queue.
//!
//! Issued operations schedule a completion event at `now + latency`; the
//! writeback stage drains all events due in the current cycle. The list is
//! kept time-sorted with ties broken by insertion order. Nodes reference
//! window entries through tagged links, so squashed operations simply turn
//! into stale nodes that the drain loop skips.

use crate::common::Cycle;
use crate::pipeline::rslink::EntryRef;

/// One pending completion.
#[derive(Debug, Clone, Copy)]
struct EventNode {
    target: EntryRef,
    when: Cycle,
}

/// Time-ordered pending-completion list.
#[derive(Default)]
pub struct EventQueue {
    nodes: Vec<EventNode>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending events (stale ones included).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no events are pending.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Schedules a completion for `target` at cycle `when`.
    ///
    /// # Panics
    ///
    /// Panics if `when` is not in the future — completions land at the start
    /// of a later cycle by construction.
    pub fn schedule(&mut self, target: EntryRef, when: Cycle, now: Cycle) {
        assert!(when > now, "event scheduled in the past");
        // Insert after any equal timestamps: ties drain in insertion order.
        let pos = self
            .nodes
            .iter()
            .position(|n| n.when > when)
            .unwrap_or(self.nodes.len());
        self.nodes.insert(pos, EventNode { target, when });
    }

    /// Removes and returns the next event due at or before `now`, or `None`
    /// when the queue is empty or every remaining event is in the future.
    /// Staleness of the returned reference is the caller's check.
    pub fn pop_due(&mut self, now: Cycle) -> Option<EntryRef> {
        match self.nodes.first() {
            Some(n) if n.when <= now => Some(self.nodes.remove(0).target),
            _ => None,
        }
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
    fn test_time_order() {
        let mut q = EventQueue::new();
        q.schedule(r(0), 10, 0);
        q.schedule(r(1), 5, 0);
        q.schedule(r(2), 7, 0);
        assert_eq!(q.pop_due(10).unwrap().index, 1);
        assert_eq!(q.pop_due(10).unwrap().index, 2);
        assert_eq!(q.pop_due(10).unwrap().index, 0);
    }

    #[test]
    fn test_ties_fifo() {
        let mut q = EventQueue::new();
        q.schedule(r(0), 5, 0);
        q.schedule(r(1), 5, 0);
        q.schedule(r(2), 5, 0);
        let order: Vec<usize> = (0..3).map(|_| q.pop_due(5).unwrap().index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_future_events_not_due() {
        let mut q = EventQueue::new();
        q.schedule(r(0), 9, 3);
        assert!(q.pop_due(8).is_none());
        assert!(q.pop_due(9).is_some());
        assert!(q.pop_due(100).is_none());
    }

    #[test]
    #[should_panic(expected = "event scheduled in the past")]
    fn test_past_event_panics() {
        let mut q = EventQueue::new();
        q.schedule(r(0), 3, 3);
    }
}
