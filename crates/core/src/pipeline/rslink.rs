//! Squash-resilient references between scheduler structures.
//!
//! Every reference into the instruction window carries the target's tag as
//! captured at link time. Squashing an entry bumps its tag, so all
//! outstanding references become stale without being chased: each structure
//! simply tag-checks before acting. References are arena indices, never
//! pointers, so cyclic dependency chains need no ownership gymnastics.

/// Which window ring an [`EntryRef`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    /// The reorder buffer.
    Ruu,
    /// The load/store queue.
    Lsq,
}

/// Tagged reference to a window entry.
///
/// Valid iff `arena[index].tag == tag` at the moment of use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    /// Target ring.
    pub queue: Queue,
    /// Slot index in the ring.
    pub index: usize,
    /// Tag snapshot taken when the reference was created.
    pub tag: u32,
}

/// One node of an output-dependency chain: the consuming entry and which of
/// its input operands this producer feeds.
#[derive(Debug, Clone, Copy)]
pub struct DepLink {
    /// The consuming entry.
    pub target: EntryRef,
    /// Index of the consumer's input operand.
    pub opnum: usize,
}
