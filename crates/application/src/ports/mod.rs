//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the store core and the outside world.
//! Adapters live in the infrastructure layer; in-memory doubles live in
//! [`crate::testing`].

mod event_source;
mod file_store;

pub use event_source::{EventSource, WatchError};
pub use file_store::{DirEntry, EntryType, FileStore, FileStoreError};
