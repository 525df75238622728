//! The create vector: logical register → in-flight producer.
//!
//! Renaming is a map from each logical register to the window entry (and
//! output slot) that will produce its next value, or to nothing when the
//! value already lives in the register file. Two views exist: the
//! non-speculative vector, shared by all non-speculative threads, and a
//! per-thread stack of speculative vectors, one per speculation level.
//! Entering a level copies the level below (or the non-speculative vector);
//! recovery truncates the stack. Levels are materialized lazily, so the
//! worst-case threads × levels × registers cube never exists.

use crate::isa::{DepName, NUM_DEP_NAMES};
use crate::pipeline::rslink::EntryRef;

/// A producer record: the creating entry and which of its outputs.
pub type CvLink = Option<(EntryRef, usize)>;

type CvTable = Box<[CvLink]>;

fn empty_table() -> CvTable {
    vec![None; NUM_DEP_NAMES].into_boxed_slice()
}

/// Architectural and speculative renaming state.
pub struct CreateVector {
    arch: CvTable,
    spec: Vec<Vec<CvTable>>,
}

impl CreateVector {
    /// Creates empty vectors: every register initially lives in the
    /// architectural register file.
    pub fn new(max_threads: usize) -> Self {
        Self {
            arch: empty_table(),
            spec: (0..max_threads).map(|_| Vec::new()).collect(),
        }
    }

    /// Reads the producer of `name` in the view a thread dispatches under.
    pub fn read(&self, thread: usize, spec_mode: bool, level: i32, name: DepName) -> CvLink {
        if spec_mode {
            self.spec[thread][level as usize][name]
        } else {
            self.arch[name]
        }
    }

    /// Publishes `link` as the latest producer of `name` in the thread's
    /// dispatch view.
    pub fn publish(&mut self, thread: usize, spec_mode: bool, level: i32, name: DepName, link: CvLink) {
        if spec_mode {
            self.spec[thread][level as usize][name] = link;
        } else {
            self.arch[name] = link;
        }
    }

    /// Pushes a new speculative level for `thread`, copied from the level
    /// below or from the non-speculative vector at level 0.
    pub fn enter_level(&mut self, thread: usize) {
        let stack = &mut self.spec[thread];
        let table = match stack.last() {
            Some(top) => top.clone(),
            None => self.arch.clone(),
        };
        stack.push(table);
    }

    /// Seeds a forked child's level-0 vector from the parent's vector at
    /// `parent_level`; a child of a non-speculative parent starts with no
    /// speculative levels (it renames through the architectural vector).
    pub fn fork_from(&mut self, child: usize, parent: usize, parent_level: i32) {
        if parent_level < 0 {
            self.spec[child].clear();
        } else {
            let table = self.spec[parent][parent_level as usize].clone();
            self.spec[child] = vec![table];
        }
    }

    /// Truncates `thread`'s speculative stack back to `new_level` (−1 drops
    /// every level).
    pub fn recover(&mut self, thread: usize, new_level: i32) {
        self.spec[thread].truncate((new_level + 1).max(0) as usize);
    }

    /// Drops all speculative levels of a released thread slot.
    pub fn clear_thread(&mut self, thread: usize) {
        self.spec[thread].clear();
    }

    /// Clears every view entry that names `producer`'s output `odep` for
    /// register `name` — called when the producer completes, so later
    /// consumers read the register file instead of a dead entry.
    pub fn clear_matching(
        &mut self,
        name: DepName,
        producer: EntryRef,
        odep: usize,
        producer_spec: bool,
    ) {
        for stack in &mut self.spec {
            for table in stack.iter_mut() {
                if table[name] == Some((producer, odep)) {
                    table[name] = None;
                }
            }
        }
        if !producer_spec && self.arch[name] == Some((producer, odep)) {
            self.arch[name] = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::rslink::Queue;

    fn eref(idx: usize, tag: u32) -> EntryRef {
        EntryRef {
            queue: Queue::Ruu,
            index: idx,
            tag,
        }
    }

    #[test]
    fn test_arch_publish_read() {
        let mut cv = CreateVector::new(2);
        assert_eq!(cv.read(0, false, -1, 5), None);
        cv.publish(0, false, -1, 5, Some((eref(3, 1), 0)));
        assert_eq!(cv.read(0, false, -1, 5), Some((eref(3, 1), 0)));
        // Another non-speculative thread shares the view.
        assert_eq!(cv.read(1, false, -1, 5), Some((eref(3, 1), 0)));
    }

    #[test]
    fn test_level_entry_copies_and_isolates() {
        let mut cv = CreateVector::new(2);
        cv.publish(0, false, -1, 4, Some((eref(1, 0), 0)));
        cv.enter_level(0);
        assert_eq!(cv.read(0, true, 0, 4), Some((eref(1, 0), 0)));

        cv.publish(0, true, 0, 4, Some((eref(2, 0), 0)));
        cv.enter_level(0);
        assert_eq!(cv.read(0, true, 1, 4), Some((eref(2, 0), 0)));

        // Speculative publishes never leak into the architectural view.
        assert_eq!(cv.read(0, false, -1, 4), Some((eref(1, 0), 0)));

        cv.recover(0, 0);
        assert_eq!(cv.read(0, true, 0, 4), Some((eref(2, 0), 0)));
        cv.recover(0, -1);
        assert_eq!(cv.read(0, false, -1, 4), Some((eref(1, 0), 0)));
    }

    #[test]
    fn test_clear_matching_all_views() {
        let mut cv = CreateVector::new(2);
        let p = eref(7, 2);
        cv.publish(0, false, -1, 9, Some((p, 1)));
        cv.enter_level(0);
        cv.enter_level(1);
        cv.publish(1, true, 0, 9, Some((p, 1)));

        cv.clear_matching(9, p, 1, false);
        assert_eq!(cv.read(0, false, -1, 9), None);
        assert_eq!(cv.read(0, true, 0, 9), None);
        assert_eq!(cv.read(1, true, 0, 9), None);
    }

    #[test]
    fn test_clear_matching_spares_newer_producer() {
        let mut cv = CreateVector::new(1);
        let old = eref(1, 0);
        let new = eref(2, 0);
        cv.publish(0, false, -1, 3, Some((old, 0)));
        cv.publish(0, false, -1, 3, Some((new, 0)));
        cv.clear_matching(3, old, 0, false);
        assert_eq!(cv.read(0, false, -1, 3), Some((new, 0)));
    }
}
