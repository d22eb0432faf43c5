//! Courier Domain - Core collection types
//!
//! This crate defines the entities of a file-backed collection (collections,
//! folders, requests, environments), their stable identifiers and the codec
//! that turns them into on-disk documents and back.
//! All types here are pure Rust with no I/O dependencies.

pub mod environment;
pub mod error;
pub mod id;
pub mod persistence;
pub mod request;

pub use environment::{
    Environment, ResolutionContext, ResolvedVariable, Variable, VariableScope, VariableSet,
};
pub use error::{DomainError, DomainResult};
pub use id::NodeId;
pub use persistence::{
    CodecError, Document, DocumentKind, PersistenceCollection, PersistenceFolder, SavedRequest,
};
pub use request::ResolvedRequest;
