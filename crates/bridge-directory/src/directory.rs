//! The virtual directory adapter.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Seek, SeekFrom};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bridge_store::ObjectStore;
use bridge_types::path;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::handle::FileHandle;

/// How [`VirtualDirectory::get_file_handle`] hands out a handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandleMode {
    /// Reuse the registered handle for the name; its cursor is reset to 0
    /// and shared by every caller. Only safe for short, atomic accesses.
    #[default]
    Shared,
    /// Load a fresh, unregistered copy with its own cursor.
    Private,
}

/// A handle returned by [`VirtualDirectory::get_file_handle`].
///
/// Shared handles stay owned by the directory and are borrowed out; private
/// handles are owned by the caller and never flushed by the directory.
#[derive(Debug)]
pub enum Handle<'a> {
    Shared(&'a mut FileHandle),
    Private(FileHandle),
}

impl Deref for Handle<'_> {
    type Target = FileHandle;

    fn deref(&self) -> &FileHandle {
        match self {
            Handle::Shared(handle) => handle,
            Handle::Private(handle) => handle,
        }
    }
}

impl DerefMut for Handle<'_> {
    fn deref_mut(&mut self) -> &mut FileHandle {
        match self {
            Handle::Shared(handle) => handle,
            Handle::Private(handle) => handle,
        }
    }
}

/// A set of named binary files living under one store path.
///
/// Every file name is resolved to `root/name` before it reaches the store.
/// Open handles are buffered write-back: writes only touch memory until the
/// handle is flushed by [`purge_file`](Self::purge_file),
/// [`close`](Self::close), or a rename/delete of the same name. At most one
/// registered handle exists per name.
pub struct VirtualDirectory {
    store: Arc<dyn ObjectStore>,
    root: String,
    handles: HashMap<String, FileHandle>,
}

impl VirtualDirectory {
    /// Open a directory rooted at `root` in `store`.
    pub fn new(store: Arc<dyn ObjectStore>, root: &str) -> Self {
        let root = path::normalize(root);
        debug!(%root, "virtual directory opened");
        Self {
            store,
            root,
            handles: HashMap::new(),
        }
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, config: &DirectoryConfig) -> Self {
        Self::new(store, &config.root)
    }

    /// The store path all files live under.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Number of handles currently registered.
    pub fn open_handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Names of the leaf objects directly under the root.
    pub fn list_files(&self) -> DirectoryResult<Vec<String>> {
        let mut files = Vec::new();
        for name in self.store.scan(&self.root)? {
            if self.store.is_object(&self.full_path(&name)?)? {
                files.push(name);
            }
        }
        Ok(files)
    }

    /// Create a new, empty file, discarding whatever existed under `name`.
    pub fn create_file(&mut self, name: &str) -> DirectoryResult<&mut FileHandle> {
        let full = self.full_path(name)?;
        self.delete_file(name)?;
        self.store.touch(&full)?;
        debug!(file = name, "file created");
        Ok(self
            .handles
            .entry(name.to_string())
            .or_insert_with(|| FileHandle::empty(name)))
    }

    /// Delete a file. Any open handle is flushed and evicted first so that a
    /// later close cannot resurrect it. No-op if the file does not exist.
    pub fn delete_file(&mut self, name: &str) -> DirectoryResult<()> {
        let full = self.full_path(name)?;
        self.purge_file(name)?;
        if self.store.is_object(&full)? {
            self.store.remove(&full)?;
            debug!(file = name, "file deleted");
        }
        Ok(())
    }

    /// Flush and evict the handle for `name`, keeping the underlying object.
    ///
    /// Callers must purge handles they no longer need; this is what bounds
    /// memory for sessions touching many segment files.
    pub fn purge_file(&mut self, name: &str) -> DirectoryResult<()> {
        path::validate_segment(name)?;
        if self.flush_handle(name)? {
            self.handles.remove(name);
            debug!(file = name, "handle purged");
        }
        Ok(())
    }

    /// Returns `true` if a handle is open or an underlying object exists.
    pub fn file_exists(&self, name: &str) -> DirectoryResult<bool> {
        let full = self.full_path(name)?;
        if self.handles.contains_key(name) {
            return Ok(true);
        }
        Ok(self.store.is_object(&full)?)
    }

    /// Length of a file. An open handle's cursor is left where it was.
    pub fn file_length(&mut self, name: &str) -> DirectoryResult<u64> {
        let full = self.full_path(name)?;
        if let Some(handle) = self.handles.get_mut(name) {
            let position = handle.tell();
            let length = handle.seek(SeekFrom::End(0))?;
            handle.seek(SeekFrom::Start(position))?;
            return Ok(length);
        }
        Ok(self.store.size(&full)?)
    }

    /// Last modification time recorded by the store.
    pub fn file_modified_time(&self, name: &str) -> DirectoryResult<DateTime<Utc>> {
        Ok(self.store.mtime(&self.full_path(name)?)?)
    }

    /// Rename `from` to `to`, replacing any existing `to`.
    pub fn rename_file(&mut self, from: &str, to: &str) -> DirectoryResult<()> {
        let full_from = self.full_path(from)?;
        let full_to = self.full_path(to)?;
        self.purge_file(from)?;
        self.purge_file(to)?;
        if self.store.is_object(&full_to)? {
            self.store.remove(&full_to)?;
        }
        self.store.move_object(&full_from, &full_to)?;
        debug!(from, to, "file renamed");
        Ok(())
    }

    /// Set the underlying object's modification time to now.
    pub fn touch_file(&self, name: &str) -> DirectoryResult<()> {
        self.store.touch(&self.full_path(name)?)?;
        Ok(())
    }

    /// Open a handle for an existing file.
    ///
    /// Fails with [`DirectoryError::FileNotAccessible`] if no underlying
    /// object exists. See [`HandleMode`] for the sharing semantics.
    pub fn get_file_handle(&mut self, name: &str, mode: HandleMode) -> DirectoryResult<Handle<'_>> {
        match mode {
            HandleMode::Shared => self.shared_handle(name).map(Handle::Shared),
            HandleMode::Private => self.private_handle(name).map(Handle::Private),
        }
    }

    /// Shared handle for `name`; see [`HandleMode::Shared`].
    pub fn shared_handle(&mut self, name: &str) -> DirectoryResult<&mut FileHandle> {
        let full = self.accessible_path(name)?;
        match self.handles.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let handle = entry.into_mut();
                handle.rewind()?;
                Ok(handle)
            }
            Entry::Vacant(entry) => {
                let data = self.store.get(&full)?;
                Ok(entry.insert(FileHandle::new(name, data)))
            }
        }
    }

    /// Private handle for `name`; see [`HandleMode::Private`].
    pub fn private_handle(&mut self, name: &str) -> DirectoryResult<FileHandle> {
        let full = self.accessible_path(name)?;
        // The fresh copy must see writes still buffered in a shared handle.
        self.flush_handle(name)?;
        let data = self.store.get(&full)?;
        Ok(FileHandle::new(name, data))
    }

    /// Flush every open handle and clear the handle cache. Idempotent.
    ///
    /// On a store failure the remaining handles stay registered, so a later
    /// `close` retries them.
    pub fn close(&mut self) -> DirectoryResult<()> {
        let names: Vec<String> = self.handles.keys().cloned().collect();
        for name in names {
            self.flush_handle(&name)?;
            self.handles.remove(&name);
        }
        Ok(())
    }

    /// Persist the handle for `name`, if one is open. Returns whether a
    /// handle was flushed.
    fn flush_handle(&self, name: &str) -> DirectoryResult<bool> {
        let Some(handle) = self.handles.get(name) else {
            return Ok(false);
        };
        self.store.set(&self.full_path(name)?, handle.data())?;
        debug!(file = name, bytes = handle.length(), "handle flushed");
        Ok(true)
    }

    fn accessible_path(&self, name: &str) -> DirectoryResult<String> {
        let full = self.full_path(name)?;
        if !self.store.is_object(&full)? {
            return Err(DirectoryError::FileNotAccessible(name.to_string()));
        }
        Ok(full)
    }

    /// Resolve a single-segment file name to its store path.
    fn full_path(&self, name: &str) -> DirectoryResult<String> {
        path::validate_segment(name)?;
        Ok(path::join(&self.root, name))
    }
}

impl Drop for VirtualDirectory {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        warn!(
            root = %self.root,
            open = self.handles.len(),
            "virtual directory dropped without close; flushing"
        );
        if let Err(e) = self.close() {
            warn!(root = %self.root, error = %e, "flush on drop failed; buffered writes lost");
        }
    }
}

impl std::fmt::Debug for VirtualDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDirectory")
            .field("root", &self.root)
            .field("open_handles", &self.handles.len())
            .finish()
    }
}
