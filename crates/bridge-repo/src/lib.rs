//! Transactional entity repository.
//!
//! Entities are serialized records stored at hierarchical paths; resources
//! are named blobs attached to an entity's path. All mutations are staged
//! in a [`UnitOfWork`] and applied to the object store in one ordered pass
//! on [`UnitOfWork::commit`]. The repository keeps the
//! [`IdentifierCache`](bridge_index::IdentifierCache) in step with committed
//! moves and deletes and reports every committed change to a [`Watcher`].
//!
//! # Storage Layout
//!
//! ```text
//! <storage_root>/<entity path>/Entity.object   serialized entity (JSON)
//! <storage_root>/<entity path>/<resource>      resource blob
//! <storage_root>/<entity path>/<child>/...     child entities
//! ```

pub mod config;
pub mod entity;
pub mod error;
mod layout;
mod mutation;
pub mod repository;
pub mod unit_of_work;
pub mod watcher;

pub use config::{BridgeConfig, CopyPolicy, RepositoryConfig};
pub use entity::Entity;
pub use error::{RepositoryError, RepositoryResult};
pub use repository::Repository;
pub use unit_of_work::{CommitReport, UnitOfWork};
pub use watcher::{Change, ChangeKind, NoOpWatcher, RecordingWatcher, Watcher};

// Re-export key types
pub use bridge_directory::{DirectoryConfig, VirtualDirectory};
pub use bridge_index::{IdentifierCache, IndexEngine};
pub use bridge_store::ObjectStore;
pub use bridge_types::Identifier;
