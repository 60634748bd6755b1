//! Local filesystem backend.
//!
//! Store paths map onto a directory tree below a root: objects are files,
//! containers are directories.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bridge_types::path;
use bridge_types::TypeError;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// Object store backed by files below a local root directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "filesystem store opened");
        Ok(Self { root })
    }

    /// The local root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local(&self, store_path: &str) -> StoreResult<PathBuf> {
        let mut local = self.root.clone();
        for segment in path::segments(store_path) {
            if segment == "." || segment == ".." {
                return Err(StoreError::InvalidPath(TypeError::InvalidPath {
                    path: store_path.to_string(),
                    reason: "relative segment escapes the store root".into(),
                }));
            }
            local.push(segment);
        }
        Ok(local)
    }

    fn ensure_parent(local: &Path) -> StoreResult<()> {
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn file_metadata(&self, store_path: &str) -> StoreResult<fs::Metadata> {
        let local = self.local(store_path)?;
        match fs::metadata(&local) {
            Ok(meta) if meta.is_file() => Ok(meta),
            Ok(_) => Err(StoreError::NotFound(path::normalize(store_path))),
            Err(e) => Err(not_found_or_io(e, store_path)),
        }
    }
}

fn not_found_or_io(e: io::Error, store_path: &str) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(path::normalize(store_path))
    } else {
        StoreError::Io(e)
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        let local = self.local(path)?;
        if local.is_dir() {
            return Err(StoreError::NotFound(path::normalize(path)));
        }
        fs::read(&local).map_err(|e| not_found_or_io(e, path))
    }

    fn set(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        let local = self.local(path)?;
        Self::ensure_parent(&local)?;
        fs::write(&local, data)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> StoreResult<bool> {
        let local = self.local(path)?;
        if local == self.root {
            // Never remove the root directory itself, only its content.
            let mut removed = false;
            for entry in fs::read_dir(&local)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    fs::remove_dir_all(entry.path())?;
                } else {
                    fs::remove_file(entry.path())?;
                }
                removed = true;
            }
            return Ok(removed);
        }
        match fs::symlink_metadata(&local) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&local)?,
            Ok(_) => fs::remove_file(&local)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    fn move_object(&self, from: &str, to: &str) -> StoreResult<()> {
        if path::is_descendant(to, from) {
            return Err(StoreError::InvalidPath(TypeError::InvalidPath {
                path: path::normalize(to),
                reason: format!("cannot move {} into itself", path::normalize(from)),
            }));
        }
        let source = self.local(from)?;
        let target = self.local(to)?;
        if !source.exists() {
            return Err(StoreError::NotFound(path::normalize(from)));
        }
        if source == target {
            return Ok(());
        }
        self.remove(to)?;
        Self::ensure_parent(&target)?;
        fs::rename(&source, &target)?;
        Ok(())
    }

    fn touch(&self, path: &str) -> StoreResult<()> {
        let local = self.local(path)?;
        if local.exists() {
            let file = File::options().write(true).open(&local)?;
            file.set_modified(SystemTime::now())?;
        } else {
            Self::ensure_parent(&local)?;
            File::create(&local)?;
        }
        Ok(())
    }

    fn size(&self, path: &str) -> StoreResult<u64> {
        Ok(self.file_metadata(path)?.len())
    }

    fn mtime(&self, path: &str) -> StoreResult<DateTime<Utc>> {
        let modified = self.file_metadata(path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn is_object(&self, path: &str) -> StoreResult<bool> {
        Ok(self.local(path)?.is_file())
    }

    fn is_container(&self, path: &str) -> StoreResult<bool> {
        let local = self.local(path)?;
        if !local.is_dir() {
            return Ok(false);
        }
        Ok(fs::read_dir(&local)?.next().is_some())
    }

    fn scan(&self, path: &str) -> StoreResult<Vec<String>> {
        let local = self.local(path)?;
        if !local.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&local)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn read_stream(&self, path: &str) -> StoreResult<Box<dyn Read + Send>> {
        let local = self.local(path)?;
        if local.is_dir() {
            return Err(StoreError::NotFound(path::normalize(path)));
        }
        let file = File::open(&local).map_err(|e| not_found_or_io(e, path))?;
        Ok(Box::new(file))
    }

    fn write_stream(&self, path: &str, reader: &mut dyn Read) -> StoreResult<u64> {
        let local = self.local(path)?;
        Self::ensure_parent(&local)?;
        let mut file = File::create(&local)?;
        Ok(io::copy(reader, &mut file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path().join("store")).unwrap();
        (dir, store)
    }

    #[test]
    fn set_get_and_size() {
        let (_dir, store) = temp_store();
        store.set("/docs/a.txt", b"hello").unwrap();
        assert_eq!(store.get("/docs/a.txt").unwrap(), b"hello");
        assert_eq!(store.size("/docs/a.txt").unwrap(), 5);
        assert!(store.is_object("/docs/a.txt").unwrap());
        assert!(store.is_container("/docs").unwrap());
        assert!(!store.is_object("/docs").unwrap());
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_dir, store) = temp_store();
        assert!(matches!(store.get("/nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.size("/nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.mtime("/nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn container_is_not_an_object() {
        let (_dir, store) = temp_store();
        store.set("/dir/leaf", b"x").unwrap();
        assert!(matches!(store.get("/dir"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.size("/dir"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn relative_segments_are_rejected() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.set("/../escape", b"x"),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn scan_and_remove_subtree() {
        let (_dir, store) = temp_store();
        store.set("/x/Entity.object", b"1").unwrap();
        store.set("/x/y/Entity.object", b"2").unwrap();
        let mut names = store.scan("/x").unwrap();
        names.sort();
        assert_eq!(names, vec!["Entity.object", "y"]);

        assert!(store.remove("/x").unwrap());
        assert!(!store.exists("/x").unwrap());
        assert!(!store.remove("/x").unwrap());
        assert!(store.scan("/x").unwrap().is_empty());
    }

    #[test]
    fn move_replaces_existing_target() {
        let (_dir, store) = temp_store();
        store.set("/a", b"new").unwrap();
        store.set("/b", b"old").unwrap();
        store.move_object("/a", "/b").unwrap();
        assert!(!store.is_object("/a").unwrap());
        assert_eq!(store.get("/b").unwrap(), b"new");
    }

    #[test]
    fn move_directory_into_new_parent() {
        let (_dir, store) = temp_store();
        store.set("/x/a/obj", b"1").unwrap();
        store.move_object("/x", "/deep/z").unwrap();
        assert_eq!(store.get("/deep/z/a/obj").unwrap(), b"1");
    }

    #[test]
    fn touch_creates_and_updates() {
        let (_dir, store) = temp_store();
        store.touch("/idx/segments.gen").unwrap();
        assert_eq!(store.size("/idx/segments.gen").unwrap(), 0);

        store.set("/idx/segments.gen", b"abc").unwrap();
        let before = store.mtime("/idx/segments.gen").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        store.touch("/idx/segments.gen").unwrap();
        assert!(store.mtime("/idx/segments.gen").unwrap() >= before);
        assert_eq!(store.get("/idx/segments.gen").unwrap(), b"abc");
    }

    #[test]
    fn streams_use_files() {
        let (_dir, store) = temp_store();
        let mut source: &[u8] = b"0123456789";
        assert_eq!(store.write_stream("/blob", &mut source).unwrap(), 10);
        let mut out = Vec::new();
        store.read_stream("/blob").unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123456789");
    }

    #[test]
    fn remove_root_keeps_directory() {
        let (_dir, store) = temp_store();
        store.set("/a", b"1").unwrap();
        store.set("/b/c", b"2").unwrap();
        assert!(store.remove("/").unwrap());
        assert!(store.root().is_dir());
        assert!(store.scan("/").unwrap().is_empty());
    }
}
