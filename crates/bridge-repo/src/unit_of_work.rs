//! Units of work: staged reads and writes against a repository.
//!
//! Every mutation made through a [`UnitOfWork`] is staged in memory and is
//! visible to reads through the same unit only. [`UnitOfWork::commit`]
//! applies the staged state to the store in dependency order, updates the
//! identifier cache and notifies the repository's watcher.
//! [`UnitOfWork::rollback`] (or dropping the unit) discards it.

use std::collections::{BTreeSet, VecDeque};
use std::io::{Cursor, Read};

use bridge_store::StoreError;
use bridge_types::{path, Identifier};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::CopyPolicy;
use crate::entity::Entity;
use crate::error::{RepositoryError, RepositoryResult};
use crate::mutation::{EntityMutation, ResourceKey, ResourceMutation, StagedMutations, StepAction};
use crate::repository::{not_found, Repository};
use crate::watcher::{Change, ChangeKind};

/// Changes applied by a successful commit, in application order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub changes: Vec<Change>,
}

impl CommitReport {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Where a staged resource read is served from.
enum StagedRead {
    Bytes(Vec<u8>),
    Stored(String),
    Deleted,
}

/// Resolved location of a readable resource.
enum ResourceSource {
    Staged(Vec<u8>),
    Stored(String),
}

/// An entity and its resources, rewritten for a new location.
struct Relocated {
    entity: Entity,
    resources: Vec<(String, ResourceMutation)>,
}

/// A batch of staged entity and resource mutations.
pub struct UnitOfWork<'r> {
    repo: &'r Repository,
    staged: StagedMutations,
    user: Option<String>,
}

impl<'r> UnitOfWork<'r> {
    pub(crate) fn new(repo: &'r Repository) -> Self {
        Self {
            repo,
            staged: StagedMutations::default(),
            user: None,
        }
    }

    /// Record `user` as the author of saves made through this unit.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Number of staged mutations.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    // -----------------------------------------------------------------------
    // Entity reads
    // -----------------------------------------------------------------------

    /// The entity at `entity_path`, staged state first.
    pub fn get_entity(&self, entity_path: &str) -> RepositoryResult<Entity> {
        path::validate_entity_path(entity_path)?;
        match self.staged.entities.get(entity_path) {
            Some(EntityMutation::Save(entity)) => return Ok(entity.clone()),
            Some(EntityMutation::Delete) => return Err(not_found(entity_path)),
            None => {}
        }
        if self.staged.is_deleted(entity_path) {
            return Err(not_found(entity_path));
        }
        self.repo
            .load_entity(entity_path)?
            .ok_or_else(|| not_found(entity_path))
    }

    pub fn has_entity(&self, entity_path: &str) -> RepositoryResult<bool> {
        path::validate_entity_path(entity_path)?;
        match self.staged.entities.get(entity_path) {
            Some(EntityMutation::Save(_)) => return Ok(true),
            Some(EntityMutation::Delete) => return Ok(false),
            None => {}
        }
        if self.staged.is_deleted(entity_path) {
            return Ok(false);
        }
        self.repo.entity_stored(entity_path)
    }

    /// The committed entity at `entity_path`, ignoring staged mutations.
    pub fn get_entity_from_storage(&self, entity_path: &str) -> RepositoryResult<Option<Entity>> {
        path::validate_entity_path(entity_path)?;
        self.repo.load_entity(entity_path)
    }

    /// Resolve an entity by identifier through the identifier cache.
    ///
    /// Entities saved in this unit are found before the cache is consulted.
    /// A cached path that no longer holds the entity is evicted.
    pub fn get_entity_by_identifier(&self, identifier: &Identifier) -> RepositoryResult<Entity> {
        let staged = self.staged.entities.values().find_map(|m| match m {
            EntityMutation::Save(entity) if entity.identifier == *identifier => Some(entity),
            _ => None,
        });
        if let Some(entity) = staged {
            return Ok(entity.clone());
        }

        let Some(entity_path) = self.repo.identifiers().get_path(identifier)? else {
            return Err(not_found(identifier.to_string()));
        };
        let entity = match self.get_entity(&entity_path) {
            Ok(entity) => entity,
            Err(RepositoryError::NotFound(_)) => return Err(not_found(identifier.to_string())),
            Err(e) => return Err(e),
        };
        if entity.identifier != *identifier {
            debug!(%identifier, path = %entity_path, "cached path holds another entity");
            self.repo.identifiers().remove_by_identifier(identifier);
            return Err(not_found(identifier.to_string()));
        }
        Ok(entity)
    }

    /// Children of `entity`, sorted by path.
    ///
    /// With `deep`, the whole subtree is returned. `kind` filters the
    /// result without pruning the traversal.
    pub fn get_children(
        &self,
        entity: &Entity,
        kind: Option<&str>,
        deep: bool,
    ) -> RepositoryResult<Vec<Entity>> {
        let root = entity.path_str()?;
        let mut children = Vec::new();
        let mut pending: VecDeque<String> = self.child_paths(root)?.into();
        while let Some(child_path) = pending.pop_front() {
            let child = self.get_entity(&child_path)?;
            if deep {
                pending.extend(self.child_paths(&child_path)?);
            }
            if kind.map_or(true, |k| child.kind == k) {
                children.push(child);
            }
        }
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    pub fn has_children(&self, entity: &Entity) -> RepositoryResult<bool> {
        Ok(!self.child_paths(entity.path_str()?)?.is_empty())
    }

    /// Parent of `entity`, or `None` for a top-level entity.
    pub fn get_parent(&self, entity: &Entity) -> RepositoryResult<Option<Entity>> {
        let entity_path = entity.path_str()?;
        match path::parent(entity_path) {
            Some(parent) if parent != path::ROOT => self.get_entity(&parent).map(Some),
            _ => Ok(None),
        }
    }

    /// Every committed entity below `entity_path`, ignoring staged state.
    pub fn get_descendants_from_storage(&self, entity_path: &str) -> RepositoryResult<Vec<Entity>> {
        path::validate_entity_path(entity_path)?;
        let mut descendants = Vec::new();
        for descendant in self.repo.stored_descendants(entity_path)? {
            if let Some(entity) = self.repo.load_entity(&descendant)? {
                descendants.push(entity);
            }
        }
        Ok(descendants)
    }

    // -----------------------------------------------------------------------
    // Entity writes
    // -----------------------------------------------------------------------

    /// Stage a save of `entity` at its path and return the stamped entity.
    pub fn save_entity(&mut self, mut entity: Entity) -> RepositoryResult<Entity> {
        let entity_path = entity.path_str()?.to_string();
        self.check_entity_slot(&entity_path)?;
        let now = Utc::now();
        if entity.created.is_none() {
            entity.created = Some(now);
            entity.created_by = self.user.clone();
        }
        entity.modified = Some(now);
        entity.modified_by = self.user.clone();
        debug!(path = %entity_path, identifier = %entity.identifier, "entity save staged");
        self.staged
            .entities
            .insert(entity_path, EntityMutation::Save(entity.clone()));
        Ok(entity)
    }

    pub fn delete_entity(&mut self, entity: &Entity) -> RepositoryResult<()> {
        let entity_path = entity.path_str()?.to_string();
        self.delete_entity_by_path(&entity_path)
    }

    /// Stage the removal of the entity at `entity_path` together with every
    /// descendant and every attached resource.
    pub fn delete_entity_by_path(&mut self, entity_path: &str) -> RepositoryResult<()> {
        if !self.has_entity(entity_path)? {
            return Err(not_found(entity_path));
        }
        let mut doomed = vec![entity_path.to_string()];
        doomed.extend(self.repo.stored_descendants(entity_path)?);

        let mut stored = Vec::new();
        let mut resources = Vec::new();
        for candidate in doomed {
            if self.repo.entity_stored(&candidate)? {
                for name in self.repo.stored_resources(&candidate)? {
                    resources.push((candidate.clone(), name));
                }
                stored.push(candidate);
            }
        }

        // Staged-only saves below the path simply vanish.
        self.staged.discard_under(entity_path);
        debug!(
            path = entity_path,
            entities = stored.len(),
            resources = resources.len(),
            "entity delete staged"
        );
        for candidate in stored {
            self.staged.entities.insert(candidate, EntityMutation::Delete);
        }
        for key in resources {
            self.staged.resources.insert(key, ResourceMutation::Delete);
        }
        Ok(())
    }

    /// Stage a move of `entity` and its subtree to `target`. Identifiers
    /// are kept. Returns the entity at its new location.
    pub fn move_entity(&mut self, entity: &Entity, target: &str) -> RepositoryResult<Entity> {
        let source = entity.path_str()?.to_string();
        self.check_relocation(&source, target)?;
        if self.has_entity(target)? {
            return Err(RepositoryError::InvalidPath(format!(
                "move target already exists: {target}"
            )));
        }
        let relocated = self.relocate_subtree(&source, target, false)?;
        self.delete_entity_by_path(&source)?;
        debug!(from = %source, to = target, entities = relocated.len(), "entity move staged");
        self.stage_relocated(relocated)
    }

    /// Stage a copy of `entity` and its subtree at `target`. Every copy gets
    /// a fresh identifier. An existing target is handled per the configured
    /// [`CopyPolicy`]. Returns the copied root entity.
    pub fn copy_entity(&mut self, entity: &Entity, target: &str) -> RepositoryResult<Entity> {
        let source = entity.path_str()?.to_string();
        self.check_relocation(&source, target)?;
        if self.has_entity(target)? {
            match self.repo.config().copy_policy {
                CopyPolicy::Reject => {
                    return Err(RepositoryError::InvalidPath(format!(
                        "copy target already exists: {target}"
                    )))
                }
                CopyPolicy::Overwrite => {
                    debug!(target, "overwriting copy target");
                    self.delete_entity_by_path(target)?;
                }
            }
        }
        let relocated = self.relocate_subtree(&source, target, true)?;
        debug!(from = %source, to = target, entities = relocated.len(), "entity copy staged");
        self.stage_relocated(relocated)
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    /// Stage `data` as the resource `name` of `entity`.
    pub fn save_resource(
        &mut self,
        entity: &Entity,
        name: &str,
        data: impl Into<Vec<u8>>,
    ) -> RepositoryResult<()> {
        let key = self.resource_key(entity, name)?;
        self.require_entity(&key.0)?;
        self.check_resource_slot(&key)?;
        debug!(path = %key.0, name, "resource save staged");
        self.staged
            .resources
            .insert(key, ResourceMutation::Bytes(data.into()));
        Ok(())
    }

    /// Stage a resource whose content is drained from `reader` at commit.
    pub fn write_resource<R>(&mut self, entity: &Entity, name: &str, reader: R) -> RepositoryResult<()>
    where
        R: Read + Send + 'static,
    {
        let key = self.resource_key(entity, name)?;
        self.require_entity(&key.0)?;
        self.check_resource_slot(&key)?;
        debug!(path = %key.0, name, "resource stream staged");
        self.staged
            .resources
            .insert(key, ResourceMutation::Stream(Box::new(reader)));
        Ok(())
    }

    pub fn delete_resource(&mut self, entity: &Entity, name: &str) -> RepositoryResult<()> {
        let key = self.resource_key(entity, name)?;
        self.require_entity(&key.0)?;
        if !self.resource_names(&key.0)?.contains(&key.1) {
            return Err(not_found(path::join(&key.0, &key.1)));
        }
        debug!(path = %key.0, name, "resource delete staged");
        self.staged.resources.insert(key, ResourceMutation::Delete);
        Ok(())
    }

    /// Full content of a resource.
    pub fn get_resource(&mut self, entity: &Entity, name: &str) -> RepositoryResult<Vec<u8>> {
        match self.locate_resource(entity, name)? {
            ResourceSource::Staged(data) => Ok(data),
            ResourceSource::Stored(stored) => self.repo.store().get(&stored).map_err(from_store),
        }
    }

    /// Sequential reader over a resource.
    pub fn read_resource(
        &mut self,
        entity: &Entity,
        name: &str,
    ) -> RepositoryResult<Box<dyn Read + Send>> {
        match self.locate_resource(entity, name)? {
            ResourceSource::Staged(data) => Ok(Box::new(Cursor::new(data))),
            ResourceSource::Stored(stored) => {
                self.repo.store().read_stream(&stored).map_err(from_store)
            }
        }
    }

    /// Names of the resources attached to `entity`, sorted.
    pub fn scan_resources(&self, entity: &Entity) -> RepositoryResult<Vec<String>> {
        let entity_path = entity.path_str()?;
        self.require_entity(entity_path)?;
        self.resource_names(entity_path)
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    /// Apply every staged mutation to the store.
    ///
    /// The first store failure aborts the commit: steps already applied
    /// stay applied, the watcher is not notified, and the unit is gone.
    pub fn commit(mut self) -> RepositoryResult<CommitReport> {
        let staged = std::mem::take(&mut self.staged);
        if staged.is_empty() {
            debug!("empty unit of work committed");
            return Ok(CommitReport::default());
        }

        let plan = staged.into_plan(self.repo.layout());
        let total = plan.len();
        let mut changes = Vec::with_capacity(total);
        for step in plan {
            let saved = match &step.action {
                StepAction::Save { entity, .. } => Some(entity.identifier.clone()),
                _ => None,
            };
            if let Err(e) = self.repo.apply(step.action) {
                error!(
                    applied = changes.len(),
                    total,
                    path = %step.change.path,
                    error = %e,
                    "commit aborted"
                );
                return Err(e);
            }
            match (step.change.kind, saved) {
                (ChangeKind::EntitySaved, Some(identifier)) => {
                    self.repo.identifiers().set(identifier, step.change.path.clone());
                }
                (ChangeKind::EntityDeleted, _) => {
                    self.repo.identifiers().remove_by_path(&step.change.path);
                }
                _ => {}
            }
            changes.push(step.change);
        }

        info!(changes = changes.len(), user = ?self.user, "unit of work committed");
        self.repo.notify(&changes);
        Ok(CommitReport { changes })
    }

    /// Discard every staged mutation.
    pub fn rollback(mut self) {
        let discarded = self.staged.len();
        self.staged = StagedMutations::default();
        debug!(discarded, "unit of work rolled back");
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require_entity(&self, entity_path: &str) -> RepositoryResult<()> {
        if self.has_entity(entity_path)? {
            Ok(())
        } else {
            Err(not_found(entity_path))
        }
    }

    /// Direct children visible through this unit, sorted.
    fn child_paths(&self, entity_path: &str) -> RepositoryResult<Vec<String>> {
        let mut children: BTreeSet<String> =
            self.repo.stored_children(entity_path)?.into_iter().collect();
        children.extend(self.staged.saved_children(entity_path).map(str::to_string));
        Ok(children
            .into_iter()
            .filter(|child| !self.staged.is_deleted(child))
            .collect())
    }

    /// Every path strictly below `entity_path` visible through this unit.
    fn subtree_paths(&self, entity_path: &str) -> RepositoryResult<Vec<String>> {
        let mut found = Vec::new();
        let mut pending: VecDeque<String> = self.child_paths(entity_path)?.into();
        while let Some(current) = pending.pop_front() {
            pending.extend(self.child_paths(&current)?);
            found.push(current);
        }
        Ok(found)
    }

    fn check_relocation(&self, source: &str, target: &str) -> RepositoryResult<()> {
        path::validate_entity_path(target)?;
        if !self.has_entity(source)? {
            return Err(not_found(source));
        }
        self.check_entity_slot(target)?;
        if path::is_under(target, source) {
            return Err(RepositoryError::InvalidPath(format!(
                "cannot relocate {source} into its own subtree: {target}"
            )));
        }
        if path::is_under(source, target) {
            return Err(RepositoryError::InvalidPath(format!(
                "cannot relocate {source} onto its ancestor {target}"
            )));
        }
        Ok(())
    }

    /// Entities and resources share one namespace under their parent, so an
    /// entity may not take the name of its parent's resource or of the
    /// record object.
    fn check_entity_slot(&self, entity_path: &str) -> RepositoryResult<()> {
        let object_name = self.repo.layout().object_name();
        if path::segments(entity_path).any(|segment| segment == object_name) {
            return Err(RepositoryError::InvalidPath(format!(
                "entity path uses the record name {object_name}: {entity_path}"
            )));
        }
        if let Some(parent) = path::parent(entity_path) {
            let name = path::name(entity_path);
            if self.resource_names(&parent)?.iter().any(|r| r == name) {
                return Err(RepositoryError::InvalidPath(format!(
                    "entity path names a resource of {parent}: {entity_path}"
                )));
            }
        }
        Ok(())
    }

    /// A resource may not take the name of a child entity, nor of a
    /// container that still holds objects in the store.
    fn check_resource_slot(&self, key: &ResourceKey) -> RepositoryResult<()> {
        let (entity_path, name) = key;
        let child = path::join(entity_path, name);
        if self.child_paths(entity_path)?.contains(&child)
            || self
                .repo
                .store()
                .is_container(&self.repo.layout().resource(entity_path, name))?
        {
            return Err(RepositoryError::InvalidPath(format!(
                "resource name is taken by a child of {entity_path}: {name}"
            )));
        }
        Ok(())
    }

    /// Snapshot the subtree at `source` rewritten onto `target`.
    fn relocate_subtree(
        &mut self,
        source: &str,
        target: &str,
        fresh_identifiers: bool,
    ) -> RepositoryResult<Vec<Relocated>> {
        let mut paths = vec![source.to_string()];
        paths.extend(self.subtree_paths(source)?);

        let mut relocated = Vec::with_capacity(paths.len());
        for old_path in paths {
            let mut entity = self.get_entity(&old_path)?;
            let new_path = path::replace_prefix(&old_path, source, target)
                .ok_or_else(|| RepositoryError::InvalidPath(old_path.clone()))?;
            entity.path = Some(new_path);
            if fresh_identifiers {
                entity.identifier = Identifier::generate();
                entity.created = None;
                entity.created_by = None;
            }
            let mut resources = Vec::new();
            for name in self.resource_names(&old_path)? {
                let content = self.snapshot_resource(&old_path, &name)?;
                resources.push((name, content));
            }
            relocated.push(Relocated { entity, resources });
        }
        Ok(relocated)
    }

    fn stage_relocated(&mut self, relocated: Vec<Relocated>) -> RepositoryResult<Entity> {
        let mut root = None;
        for Relocated { entity, resources } in relocated {
            let saved = self.save_entity(entity)?;
            let entity_path = saved.path_str()?.to_string();
            for (name, content) in resources {
                self.staged
                    .resources
                    .insert((entity_path.clone(), name), content);
            }
            root.get_or_insert(saved);
        }
        root.ok_or_else(|| RepositoryError::InvalidPath("nothing to relocate".to_string()))
    }

    /// Resource content to stage at a new location.
    fn snapshot_resource(&mut self, entity_path: &str, name: &str) -> RepositoryResult<ResourceMutation> {
        let key = (entity_path.to_string(), name.to_string());
        match self.staged_read(&key)? {
            Some(StagedRead::Bytes(data)) => Ok(ResourceMutation::Bytes(data)),
            Some(StagedRead::Stored(stored)) => Ok(ResourceMutation::CopyFrom(stored)),
            Some(StagedRead::Deleted) => Err(not_found(path::join(entity_path, name))),
            None => Ok(ResourceMutation::CopyFrom(
                self.repo.layout().resource(entity_path, name),
            )),
        }
    }

    fn resource_key(&self, entity: &Entity, name: &str) -> RepositoryResult<ResourceKey> {
        let entity_path = entity.path_str()?;
        path::validate_segment(name)?;
        if name == self.repo.layout().object_name() {
            return Err(RepositoryError::InvalidPath(format!(
                "resource name is reserved for the entity record: {name}"
            )));
        }
        Ok((entity_path.to_string(), name.to_string()))
    }

    /// Resource names visible through this unit, sorted.
    fn resource_names(&self, entity_path: &str) -> RepositoryResult<Vec<String>> {
        let mut names: BTreeSet<String> = if self.staged.is_deleted(entity_path) {
            BTreeSet::new()
        } else {
            self.repo.stored_resources(entity_path)?.into_iter().collect()
        };
        for (name, mutation) in self.staged.resources_of(entity_path) {
            if matches!(mutation, ResourceMutation::Delete) {
                names.remove(name);
            } else {
                names.insert(name.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }

    fn locate_resource(&mut self, entity: &Entity, name: &str) -> RepositoryResult<ResourceSource> {
        let key = self.resource_key(entity, name)?;
        self.require_entity(&key.0)?;
        match self.staged_read(&key)? {
            Some(StagedRead::Bytes(data)) => Ok(ResourceSource::Staged(data)),
            Some(StagedRead::Stored(stored)) => Ok(ResourceSource::Stored(stored)),
            Some(StagedRead::Deleted) => Err(not_found(path::join(&key.0, &key.1))),
            None => {
                let stored = self.repo.layout().resource(&key.0, &key.1);
                if self.repo.store().is_object(&stored)? {
                    Ok(ResourceSource::Stored(stored))
                } else {
                    Err(not_found(path::join(&key.0, &key.1)))
                }
            }
        }
    }

    /// Staged state of a resource. A staged stream is drained into staged
    /// bytes so it can be read more than once.
    fn staged_read(&mut self, key: &ResourceKey) -> RepositoryResult<Option<StagedRead>> {
        let Some(slot) = self.staged.resources.get_mut(key) else {
            return Ok(None);
        };
        let read = match slot {
            ResourceMutation::Stream(reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data).map_err(StoreError::Io)?;
                *slot = ResourceMutation::Bytes(data.clone());
                StagedRead::Bytes(data)
            }
            ResourceMutation::Bytes(data) => StagedRead::Bytes(data.clone()),
            ResourceMutation::CopyFrom(stored) => StagedRead::Stored(stored.clone()),
            ResourceMutation::Delete => StagedRead::Deleted,
        };
        Ok(Some(read))
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            warn!(
                discarded = self.staged.len(),
                "unit of work dropped with staged mutations"
            );
        }
    }
}

impl std::fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("user", &self.user)
            .field("pending", &self.staged.len())
            .finish()
    }
}

fn from_store(e: StoreError) -> RepositoryError {
    match e {
        StoreError::NotFound(p) => RepositoryError::NotFound(p),
        other => RepositoryError::Storage(other),
    }
}
