//! Scheduler data structures: the instruction window and its queues.

/// Completion event queue.
pub mod eventq;
/// Fetch → dispatch instruction queue.
pub mod fetchq;
/// Ready instruction queue.
pub mod readyq;
/// Create vector (register renaming).
pub mod rename;
/// Tagged references between scheduler structures.
pub mod rslink;
/// RUU and LSQ rings.
pub mod window;
