use std::io::{Cursor, Read};

use chrono::{DateTime, Utc};

use crate::error::StoreResult;

/// Hierarchical, path-addressed object store.
///
/// Paths are canonical absolute paths as produced by
/// [`bridge_types::path::build`]; implementations normalize whatever they
/// receive. All implementations must satisfy these invariants:
/// - `set` replaces the whole object; there is no partial write.
/// - `remove` and `move_object` carry the subtree below the path along.
/// - Containers are implicit: a path is a container while anything is
///   stored below it.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read the full content of an object.
    ///
    /// Returns `Err(StoreError::NotFound)` if no object exists at `path`.
    fn get(&self, path: &str) -> StoreResult<Vec<u8>>;

    /// Create or replace an object.
    fn set(&self, path: &str, data: &[u8]) -> StoreResult<()>;

    /// Remove the object or container at `path` with everything below it.
    ///
    /// Returns `true` if anything existed.
    fn remove(&self, path: &str) -> StoreResult<bool>;

    /// Move the object or container at `from` to `to`.
    ///
    /// Whatever already exists at `to` is replaced. Fails with
    /// `StoreError::NotFound` if nothing exists at `from`.
    fn move_object(&self, from: &str, to: &str) -> StoreResult<()>;

    /// Set the modification time of `path` to now, creating an empty object
    /// if nothing exists there.
    fn touch(&self, path: &str) -> StoreResult<()>;

    /// Size in bytes of the object at `path`.
    fn size(&self, path: &str) -> StoreResult<u64>;

    /// Last modification time of the object at `path`.
    fn mtime(&self, path: &str) -> StoreResult<DateTime<Utc>>;

    /// Returns `true` if a leaf object exists at `path`.
    fn is_object(&self, path: &str) -> StoreResult<bool>;

    /// Returns `true` if `path` is a container.
    fn is_container(&self, path: &str) -> StoreResult<bool>;

    /// Names of the entries (objects and containers) directly below `path`.
    ///
    /// Order is not guaranteed. A missing container scans as empty.
    fn scan(&self, path: &str) -> StoreResult<Vec<String>>;

    /// Returns `true` if an object or a container exists at `path`.
    fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.is_object(path)? || self.is_container(path)?)
    }

    /// Open a sequential reader over an object.
    ///
    /// Default implementation buffers the full object. Backends with a
    /// native streaming primitive may override.
    fn read_stream(&self, path: &str) -> StoreResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.get(path)?)))
    }

    /// Drain `reader` into the object at `path` and return the byte count.
    ///
    /// Default implementation buffers the stream and calls `set()`.
    fn write_stream(&self, path: &str, reader: &mut dyn Read) -> StoreResult<u64> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.set(path, &data)?;
        Ok(data.len() as u64)
    }
}
