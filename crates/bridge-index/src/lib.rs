//! Index engine contract and identifier/path cache.
//!
//! The full-text index engine is an external collaborator; the bridge only
//! consumes its narrow term/document surface through [`IndexEngine`]. On top
//! of that surface sits the [`IdentifierCache`], a bidirectional mapping
//! between entity identifiers and their current paths that falls back to a
//! point lookup in the engine on a miss.
//!
//! # Key Types
//!
//! - [`IndexEngine`] -- term lookup and document retrieval
//! - [`Document`] / [`Term`] / [`DocId`] -- the engine's data model
//! - [`InMemoryIndex`] -- embedded engine for tests and small deployments
//! - [`IdentifierCache`] -- identifier <-> path cache with mutual eviction

pub mod cache;
pub mod document;
pub mod error;
pub mod memory;
pub mod traits;

pub use cache::IdentifierCache;
pub use document::{DocId, Document, Term, IDENTIFIER_FIELD, PATH_FIELD};
pub use error::{IndexError, IndexResult};
pub use memory::InMemoryIndex;
pub use traits::IndexEngine;
