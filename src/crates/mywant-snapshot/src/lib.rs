//! Snapshot persistence for MyWant node state.
//!
//! A snapshot is a point-in-time dump of every want's metadata, spec,
//! status, state, and history, keyed by want id. This crate is deliberately
//! blind to `mywant-core`'s types — everything it stores is opaque JSON —
//! so that swapping the persistence backend never touches the execution
//! engine.

mod error;
mod file;
mod memory;
mod model;
mod store;
mod writer;

pub use error::{Result, SnapshotError};
pub use file::FileSnapshotStore;
pub use memory::InMemorySnapshotStore;
pub use model::{Snapshot, SnapshotRecord};
pub use store::SnapshotStore;
pub use writer::SnapshotWriter;
