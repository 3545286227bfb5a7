//! The store module contains the implementations of the event and snapshot
//! stores.

// The in-memory implementations are compiled when the `in-memory` feature is
// enabled (this is the default).
#[cfg(feature = "in-memory")]
/// An in-memory event store.
pub mod in_memory;

#[cfg(feature = "in-memory")]
/// An in-memory snapshot store.
pub mod in_memory_snapshot;
