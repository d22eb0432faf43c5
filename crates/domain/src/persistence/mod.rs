//! Persistence models and codec for Courier collection files.
//!
//! These types define the on-disk YAML format. Every document starts with a
//! `version` key and is decoded fail-closed by [`codec::decode`].

mod body;
pub mod codec;
mod collection;
mod common;
mod folder;
pub mod layout;
mod request;

pub use body::RequestBody;
pub use codec::{CodecError, Document, DocumentKind, decode, encode};
pub use collection::{CollectionMetadata, PersistenceCollection};
pub use common::{
    CURRENT_SCHEMA_VERSION, HttpMethod, OrderKey, Protocol, SUPPORTED_SCHEMA_VERSIONS,
};
pub use folder::PersistenceFolder;
pub use layout::EntryKind;
pub use request::{RequestScripts, SavedRequest};
