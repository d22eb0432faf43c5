//! Courier Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer:
//! - [`AtomicFileStore`]: `tokio::fs` with temp-file-and-rename writes
//! - [`NotifyEventSource`]: OS change notifications through `notify`

pub mod persistence;
pub mod watch;

use std::sync::Arc;

use courier_application::{RequestStore, StoreConfig};

pub use persistence::AtomicFileStore;
pub use watch::{NotifyEventSource, NotifyGuard};

/// A request store over the real file system.
pub type FsRequestStore = RequestStore<AtomicFileStore, NotifyEventSource>;

/// Creates a request store backed by the local file system and OS
/// notifications.
#[must_use]
pub fn open_request_store(config: StoreConfig) -> FsRequestStore {
    RequestStore::new(
        Arc::new(AtomicFileStore::new()),
        NotifyEventSource::new(),
        config,
    )
}
