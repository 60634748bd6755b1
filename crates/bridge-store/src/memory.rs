use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::RwLock;

use bridge_types::path::{self, ROOT};
use bridge_types::TypeError;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

#[derive(Clone, Debug)]
struct MemoryObject {
    data: Vec<u8>,
    mtime: DateTime<Utc>,
}

impl MemoryObject {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            mtime: Utc::now(),
        }
    }
}

/// In-memory, `BTreeMap`-based object store.
///
/// Intended for tests and embedding. Objects are kept in path order behind a
/// `RwLock`, which makes subtree operations range scans. Containers are not
/// stored; they exist while any object lives below them.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, MemoryObject>>,
}

/// Key prefix shared by everything stored below `path`.
fn child_prefix(path: &str) -> String {
    if path == ROOT {
        ROOT.to_string()
    } else {
        format!("{path}/")
    }
}

fn keys_below(map: &BTreeMap<String, MemoryObject>, prefix: &str) -> Vec<String> {
    map.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|obj| obj.data.len() as u64)
            .sum()
    }

    /// Remove all objects from the store.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }

    /// Sorted list of every object path in the store.
    pub fn all_paths(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        let key = path::normalize(path);
        let map = self.objects.read().expect("lock poisoned");
        map.get(&key)
            .map(|obj| obj.data.clone())
            .ok_or(StoreError::NotFound(key))
    }

    fn set(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        let key = path::normalize(path);
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(key, MemoryObject::new(data.to_vec()));
        Ok(())
    }

    fn remove(&self, path: &str) -> StoreResult<bool> {
        let key = path::normalize(path);
        let mut map = self.objects.write().expect("lock poisoned");
        let mut removed = map.remove(&key).is_some();
        for below in keys_below(&map, &child_prefix(&key)) {
            map.remove(&below);
            removed = true;
        }
        Ok(removed)
    }

    fn move_object(&self, from: &str, to: &str) -> StoreResult<()> {
        let from = path::normalize(from);
        let to = path::normalize(to);
        if path::is_descendant(&to, &from) {
            return Err(StoreError::InvalidPath(TypeError::InvalidPath {
                path: to,
                reason: format!("cannot move {from} into itself"),
            }));
        }

        let mut map = self.objects.write().expect("lock poisoned");
        let mut moving: Vec<(String, MemoryObject)> = Vec::new();
        for key in std::iter::once(from.clone()).chain(keys_below(&map, &child_prefix(&from))) {
            if let Some(obj) = map.remove(&key) {
                moving.push((key, obj));
            }
        }
        if moving.is_empty() {
            return Err(StoreError::NotFound(from));
        }

        // The target is replaced as a whole.
        map.remove(&to);
        for below in keys_below(&map, &child_prefix(&to)) {
            map.remove(&below);
        }
        for (key, obj) in moving {
            let target = path::build([to.as_str(), &key[from.len()..]], true);
            map.insert(target, obj);
        }
        Ok(())
    }

    fn touch(&self, path: &str) -> StoreResult<()> {
        let key = path::normalize(path);
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(key)
            .and_modify(|obj| obj.mtime = Utc::now())
            .or_insert_with(|| MemoryObject::new(Vec::new()));
        Ok(())
    }

    fn size(&self, path: &str) -> StoreResult<u64> {
        let key = path::normalize(path);
        let map = self.objects.read().expect("lock poisoned");
        map.get(&key)
            .map(|obj| obj.data.len() as u64)
            .ok_or(StoreError::NotFound(key))
    }

    fn mtime(&self, path: &str) -> StoreResult<DateTime<Utc>> {
        let key = path::normalize(path);
        let map = self.objects.read().expect("lock poisoned");
        map.get(&key)
            .map(|obj| obj.mtime)
            .ok_or(StoreError::NotFound(key))
    }

    fn is_object(&self, path: &str) -> StoreResult<bool> {
        let key = path::normalize(path);
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(&key))
    }

    fn is_container(&self, path: &str) -> StoreResult<bool> {
        let prefix = child_prefix(&path::normalize(path));
        let map = self.objects.read().expect("lock poisoned");
        let found = map
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix));
        Ok(found)
    }

    fn scan(&self, path: &str) -> StoreResult<Vec<String>> {
        let prefix = child_prefix(&path::normalize(path));
        let map = self.objects.read().expect("lock poisoned");
        let names: BTreeSet<String> = keys_below(&map, &prefix)
            .iter()
            .filter_map(|key| path::segments(&key[prefix.len()..]).next().map(str::to_string))
            .collect();
        Ok(names.into_iter().collect())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn store_with(paths: &[(&str, &[u8])]) -> InMemoryObjectStore {
        let store = InMemoryObjectStore::new();
        for (path, data) in paths {
            store.set(path, data).unwrap();
        }
        store
    }

    // -----------------------------------------------------------------------
    // Core get / set / remove
    // -----------------------------------------------------------------------

    #[test]
    fn set_and_get() {
        let store = InMemoryObjectStore::new();
        store.set("/a/b", b"hello").unwrap();
        assert_eq!(store.get("/a/b").unwrap(), b"hello");
        assert_eq!(store.size("/a/b").unwrap(), 5);
    }

    #[test]
    fn paths_are_normalized() {
        let store = InMemoryObjectStore::new();
        store.set("a//b/", b"x").unwrap();
        assert!(store.is_object("/a/b").unwrap());
        assert_eq!(store.all_paths(), vec!["/a/b".to_string()]);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get("/missing").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(p) if p == "/missing"));
    }

    #[test]
    fn set_replaces_whole_object() {
        let store = store_with(&[("/f", b"long content")]);
        store.set("/f", b"short").unwrap();
        assert_eq!(store.get("/f").unwrap(), b"short");
    }

    #[test]
    fn remove_takes_subtree() {
        let store = store_with(&[("/x/obj", b"1"), ("/x/y/obj", b"2"), ("/xy", b"3")]);
        assert!(store.remove("/x").unwrap());
        assert!(!store.exists("/x").unwrap());
        assert!(!store.is_object("/x/y/obj").unwrap());
        // Sibling with a shared string prefix survives.
        assert!(store.is_object("/xy").unwrap());
        assert!(!store.remove("/x").unwrap());
    }

    // -----------------------------------------------------------------------
    // Containers and scan
    // -----------------------------------------------------------------------

    #[test]
    fn containers_are_implicit() {
        let store = store_with(&[("/dir/sub/leaf", b"x")]);
        assert!(store.is_container("/dir").unwrap());
        assert!(store.is_container("/dir/sub").unwrap());
        assert!(!store.is_object("/dir").unwrap());
        assert!(!store.is_container("/dir/sub/leaf").unwrap());
        assert!(store.exists("/dir").unwrap());
    }

    #[test]
    fn scan_lists_direct_children_once() {
        let store = store_with(&[
            ("/root/a", b"1"),
            ("/root/b/one", b"2"),
            ("/root/b/two", b"3"),
            ("/rootless", b"4"),
        ]);
        let mut names = store.scan("/root").unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        assert!(store.scan("/nothing").unwrap().is_empty());
    }

    #[test]
    fn scan_root() {
        let store = store_with(&[("/a", b"1"), ("/b/c", b"2")]);
        let mut names = store.scan("/").unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    // -----------------------------------------------------------------------
    // Move / touch / mtime
    // -----------------------------------------------------------------------

    #[test]
    fn move_object_replaces_target() {
        let store = store_with(&[("/a", b"from"), ("/b", b"old")]);
        store.move_object("/a", "/b").unwrap();
        assert!(!store.is_object("/a").unwrap());
        assert_eq!(store.get("/b").unwrap(), b"from");
    }

    #[test]
    fn move_container_carries_subtree() {
        let store = store_with(&[("/x/obj", b"1"), ("/x/a/obj", b"2"), ("/z/stale", b"3")]);
        store.move_object("/x", "/z").unwrap();
        assert_eq!(store.get("/z/obj").unwrap(), b"1");
        assert_eq!(store.get("/z/a/obj").unwrap(), b"2");
        assert!(!store.is_object("/z/stale").unwrap());
        assert!(!store.exists("/x").unwrap());
    }

    #[test]
    fn move_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        assert!(matches!(
            store.move_object("/a", "/b"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn move_into_itself_is_rejected() {
        let store = store_with(&[("/x/obj", b"1")]);
        assert!(matches!(
            store.move_object("/x", "/x/inner"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(store.is_object("/x/obj").unwrap());
    }

    #[test]
    fn touch_creates_empty_object() {
        let store = InMemoryObjectStore::new();
        store.touch("/marker").unwrap();
        assert!(store.is_object("/marker").unwrap());
        assert_eq!(store.size("/marker").unwrap(), 0);
    }

    #[test]
    fn touch_advances_mtime_and_keeps_content() {
        let store = store_with(&[("/f", b"data")]);
        let before = store.mtime("/f").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.touch("/f").unwrap();
        assert!(store.mtime("/f").unwrap() > before);
        assert_eq!(store.get("/f").unwrap(), b"data");
    }

    // -----------------------------------------------------------------------
    // Streams
    // -----------------------------------------------------------------------

    #[test]
    fn stream_roundtrip() {
        let store = InMemoryObjectStore::new();
        let mut source: &[u8] = b"streamed bytes";
        let written = store.write_stream("/s", &mut source).unwrap();
        assert_eq!(written, 14);

        let mut out = String::new();
        store.read_stream("/s").unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "streamed bytes");
    }

    // -----------------------------------------------------------------------
    // Utility methods
    // -----------------------------------------------------------------------

    #[test]
    fn len_total_bytes_and_clear() {
        let store = store_with(&[("/a", b"12345"), ("/b", b"123456789")]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 14);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn debug_format() {
        let store = store_with(&[("/x", b"x")]);
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("object_count"));
    }
}
