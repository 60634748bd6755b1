//! Hierarchical, path-addressed object storage.
//!
//! The store is the lowest collaborator of the bridge: a generic key/path
//! blob store that knows nothing about entities, index segments or units of
//! work. Objects are opaque byte blobs stored at canonical absolute paths
//! (see [`bridge_types::path`]). Any strict prefix of an object's path is a
//! *container*.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- objects as files below a local root directory
//!
//! # Design Rules
//!
//! 1. The store has no partial-write primitive: `set` replaces a whole object.
//! 2. `remove` and `move_object` act on an object together with its subtree.
//! 3. The store never interprets object contents.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
