//! Repository handle and storage access.

use std::collections::VecDeque;
use std::sync::Arc;

use bridge_directory::{DirectoryConfig, VirtualDirectory};
use bridge_index::{IdentifierCache, IndexEngine};
use bridge_store::{ObjectStore, StoreError};
use bridge_types::path;
use tracing::{debug, info};

use crate::config::{BridgeConfig, RepositoryConfig};
use crate::entity::Entity;
use crate::error::{RepositoryError, RepositoryResult};
use crate::layout::Layout;
use crate::mutation::{ResourceContent, StepAction};
use crate::unit_of_work::UnitOfWork;
use crate::watcher::{Change, Watcher};

/// Transactional repository over an object store.
///
/// The repository itself only reads committed state; every mutation goes
/// through a [`UnitOfWork`] obtained from [`Repository::begin`].
pub struct Repository {
    store: Arc<dyn ObjectStore>,
    identifiers: Arc<IdentifierCache>,
    watcher: Arc<dyn Watcher>,
    config: RepositoryConfig,
    directory: DirectoryConfig,
    layout: Layout,
}

impl Repository {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        identifiers: Arc<IdentifierCache>,
        watcher: Arc<dyn Watcher>,
        config: RepositoryConfig,
    ) -> RepositoryResult<Self> {
        config.validate()?;
        info!(storage_root = %config.storage_root, "repository opened");
        Ok(Self {
            store,
            identifiers,
            watcher,
            layout: Layout::new(&config),
            config,
            directory: DirectoryConfig::default(),
        })
    }

    /// Build a repository from loaded configuration. Fails with
    /// [`RepositoryError::Config`] when the repository section is missing.
    pub fn from_config(
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn IndexEngine>,
        watcher: Arc<dyn Watcher>,
        config: &BridgeConfig,
    ) -> RepositoryResult<Self> {
        let repository = config.repository()?.clone();
        let identifiers = Arc::new(IdentifierCache::new(engine));
        let mut repo = Self::new(store, identifiers, watcher, repository)?;
        repo.directory = config.directory.clone();
        Ok(repo)
    }

    /// Start a new unit of work.
    pub fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork::new(self)
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn identifiers(&self) -> &IdentifierCache {
        &self.identifiers
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Virtual directory over the configured index root, sharing this
    /// repository's store.
    pub fn open_index_directory(&self) -> VirtualDirectory {
        VirtualDirectory::from_config(Arc::clone(&self.store), &self.directory)
    }

    // ---- Committed state ----

    pub(crate) fn layout(&self) -> &Layout {
        &self.layout
    }

    pub(crate) fn entity_stored(&self, entity_path: &str) -> RepositoryResult<bool> {
        Ok(self.store.is_object(&self.layout.record(entity_path))?)
    }

    /// Deserialize the committed entity at `entity_path`, if any.
    pub(crate) fn load_entity(&self, entity_path: &str) -> RepositoryResult<Option<Entity>> {
        let data = match self.store.get(&self.layout.record(entity_path)) {
            Ok(data) => data,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut entity: Entity = serde_json::from_slice(&data)?;
        entity.path = Some(entity_path.to_string());
        Ok(Some(entity))
    }

    /// Paths of the committed direct children of `entity_path`.
    pub(crate) fn stored_children(&self, entity_path: &str) -> RepositoryResult<Vec<String>> {
        let mut children = Vec::new();
        for name in self.store.scan(&self.layout.container(entity_path))? {
            if name == self.layout.object_name() {
                continue;
            }
            let child = path::join(entity_path, &name);
            if self.entity_stored(&child)? {
                children.push(child);
            }
        }
        children.sort();
        Ok(children)
    }

    /// Paths of every committed entity strictly below `entity_path`,
    /// breadth first.
    pub(crate) fn stored_descendants(&self, entity_path: &str) -> RepositoryResult<Vec<String>> {
        let mut found = Vec::new();
        let mut pending: VecDeque<String> = self.stored_children(entity_path)?.into();
        while let Some(current) = pending.pop_front() {
            pending.extend(self.stored_children(&current)?);
            found.push(current);
        }
        Ok(found)
    }

    /// Names of the committed resources of `entity_path`.
    pub(crate) fn stored_resources(&self, entity_path: &str) -> RepositoryResult<Vec<String>> {
        let mut names = Vec::new();
        for name in self.store.scan(&self.layout.container(entity_path))? {
            if name == self.layout.object_name() {
                continue;
            }
            if self
                .store
                .is_object(&self.layout.resource(entity_path, &name))?
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    // ---- Commit support ----

    pub(crate) fn apply(&self, action: StepAction) -> RepositoryResult<()> {
        match action {
            StepAction::Copy { from, to } => {
                let mut reader = self.store.read_stream(&from)?;
                let written = self.store.write_stream(&to, &mut reader)?;
                debug!(%from, %to, bytes = written, "resource copied");
            }
            StepAction::Remove { target } => {
                let removed = self.store.remove(&target)?;
                debug!(%target, removed, "object removed");
            }
            StepAction::Write { target, content } => match content {
                ResourceContent::Bytes(data) => self.store.set(&target, &data)?,
                ResourceContent::Stream(mut reader) => {
                    let written = self.store.write_stream(&target, &mut reader)?;
                    debug!(%target, bytes = written, "resource stream written");
                }
            },
            StepAction::Save { target, entity } => {
                let data = serde_json::to_vec_pretty(&entity)?;
                self.store.set(&target, &data)?;
            }
        }
        Ok(())
    }

    pub(crate) fn notify(&self, changes: &[Change]) {
        self.watcher.notify(changes);
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("config", &self.config)
            .field("directory", &self.directory)
            .field("identifiers", &self.identifiers)
            .finish()
    }
}

pub(crate) fn not_found(what: impl Into<String>) -> RepositoryError {
    RepositoryError::NotFound(what.into())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use bridge_index::InMemoryIndex;
    use bridge_store::InMemoryObjectStore;

    use super::*;
    use crate::watcher::NoOpWatcher;

    fn repository(store: Arc<InMemoryObjectStore>) -> Repository {
        let identifiers = Arc::new(IdentifierCache::new(Arc::new(InMemoryIndex::new())));
        Repository::new(
            store,
            identifiers,
            Arc::new(NoOpWatcher),
            RepositoryConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn from_config_requires_repository_section() {
        let config = BridgeConfig::from_toml_str("[directory]\nroot = \"/idx\"\n").unwrap();
        let err = Repository::from_config(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryIndex::new()),
            Arc::new(NoOpWatcher),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, RepositoryError::Config(_)));
    }

    #[test]
    fn from_config_rejects_invalid_values() {
        let config =
            BridgeConfig::from_toml_str("[repository]\nstorage_root = \"relative\"\n").unwrap();
        let result = Repository::from_config(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryIndex::new()),
            Arc::new(NoOpWatcher),
            &config,
        );
        assert!(matches!(result, Err(RepositoryError::Config(_))));
    }

    #[test]
    fn index_directory_shares_store() {
        let store = Arc::new(InMemoryObjectStore::new());
        let config = BridgeConfig::from_toml_str(
            "[repository]\nstorage_root = \"/repo\"\n[directory]\nroot = \"/search\"\n",
        )
        .unwrap();
        let repo = Repository::from_config(
            store.clone(),
            Arc::new(InMemoryIndex::new()),
            Arc::new(NoOpWatcher),
            &config,
        )
        .unwrap();

        let mut directory = repo.open_index_directory();
        assert_eq!(directory.root(), "/search");
        directory.create_file("seg0").unwrap().write_all(b"idx").unwrap();
        directory.close().unwrap();
        assert_eq!(store.get("/search/seg0").unwrap(), b"idx");
    }

    #[test]
    fn stored_children_skip_resources_and_record() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repository(store.clone());
        let record = serde_json::to_vec(&Entity::new("T", "/a")).unwrap();
        store.set("/content/a/Entity.object", &record).unwrap();
        store.set("/content/a/b/Entity.object", &record).unwrap();
        store.set("/content/a/b/c/Entity.object", &record).unwrap();
        store.set("/content/a/photo.jpg", b"jpg").unwrap();
        store.set("/content/a/junk/leftover", b"?").unwrap();

        assert_eq!(repo.stored_children("/a").unwrap(), vec!["/a/b"]);
        assert_eq!(repo.stored_descendants("/a").unwrap(), vec!["/a/b", "/a/b/c"]);
        assert_eq!(repo.stored_resources("/a").unwrap(), vec!["photo.jpg"]);

        // The stored path field is ignored in favour of the location.
        let loaded = repo.load_entity("/a/b").unwrap().unwrap();
        assert_eq!(loaded.path.as_deref(), Some("/a/b"));
        assert!(repo.load_entity("/nope").unwrap().is_none());
    }

    #[test]
    fn corrupt_record_is_serialization_error() {
        let store = Arc::new(InMemoryObjectStore::new());
        let repo = repository(store.clone());
        store.set("/content/bad/Entity.object", b"{not json").unwrap();
        assert!(matches!(
            repo.load_entity("/bad"),
            Err(RepositoryError::Serialization(_))
        ));
    }
}
