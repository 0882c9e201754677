//! Common orchestration-adjacent abstractions shared by the coordinator.
//!
//! - [`SyncMap`]: type-safe map that never auto-vivifies on lookup, used for
//!   the per-datapath translator cache so a missing entry can never silently
//!   read back as a freshly constructed one.

mod sync_map;

pub use sync_map::{HasRefCount, SyncMap, SyncMapError};
