//! Virtual file directory over a hierarchical object store.
//!
//! Index engines expect a directory of named, independently sized binary
//! files with positional read/write, atomic rename and modification times.
//! Object stores only offer whole-object get/set/move/remove.
//! [`VirtualDirectory`] bridges the two by buffering whole files in memory
//! ([`FileHandle`]) and persisting them at flush points: `close`, `purge`,
//! and rename/delete of the same name.
//!
//! The handle cache is not thread-safe: callers must serialize access to a
//! directory instance. Independent instances share no state.

pub mod config;
pub mod directory;
pub mod error;
pub mod handle;

pub use config::DirectoryConfig;
pub use directory::{Handle, HandleMode, VirtualDirectory};
pub use error::{DirectoryError, DirectoryResult};
pub use handle::FileHandle;
