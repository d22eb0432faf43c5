//! Courier Application - Collection store core
//!
//! This crate contains the logic of the file-backed collection store:
//! - the in-memory [`index::CollectionIndex`] kept in sync with the files
//! - the [`watcher`] bridge that folds external edits back into the index
//! - the [`variable_resolver`] for `{{variable}}` substitution
//! - the [`store::RequestStore`] façade handed to the command layer
//!
//! I/O happens only through the [`ports`], implemented by the
//! infrastructure crate.

pub mod config;
pub mod error;
pub mod index;
pub mod ports;
pub mod store;
pub mod variable_resolver;
pub mod watcher;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use index::{CollectionIndex, LoadWarning};
pub use store::{CollectionHandle, RequestStore, StoreEvent};
