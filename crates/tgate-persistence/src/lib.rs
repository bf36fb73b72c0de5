//! Snapshot persistence.
//!
//! One JSON document per logical store, written as an entry array
//! (`[[key, value], ...]`) so non-string map keys survive the
//! round-trip. Writes are debounced to at most one per second per
//! document; shutdown flushes synchronously; loads are best-effort.

pub mod debounce;
pub mod error;
pub mod store;

pub use debounce::Debouncer;
pub use error::{PersistenceError, PersistenceResult};
pub use store::{SnapshotStore, FSM_DOC, SIGNAL_DOC, TRADE_DOC};
