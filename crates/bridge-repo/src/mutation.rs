//! Staged mutations and the ordered commit plan derived from them.
//!
//! A unit of work records at most one pending mutation per entity path and
//! per resource key; a later mutation of the same key replaces the earlier
//! one. At commit the staged state is turned into a list of [`PlannedStep`]s
//! in dependency order:
//!
//! 1. resource copies (read their source before anything is removed)
//! 2. resource deletes
//! 3. entity deletes, deepest first
//! 4. resource writes
//! 5. entity saves, shallowest first
//!
//! so no resource outlives the removal of its entity, and no entity record
//! appears before its resources and ancestors.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use bridge_types::path;

use crate::entity::Entity;
use crate::layout::Layout;
use crate::watcher::{Change, ChangeKind};

/// `(entity path, resource name)`.
pub(crate) type ResourceKey = (String, String);

#[derive(Clone, Debug)]
pub(crate) enum EntityMutation {
    Save(Entity),
    Delete,
}

pub(crate) enum ResourceMutation {
    Bytes(Vec<u8>),
    /// Drained into the store at commit.
    Stream(Box<dyn Read + Send>),
    /// Copy of an existing store object, read at commit.
    CopyFrom(String),
    Delete,
}

impl fmt::Debug for ResourceMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            Self::Stream(_) => f.write_str("Stream"),
            Self::CopyFrom(source) => write!(f, "CopyFrom({source})"),
            Self::Delete => f.write_str("Delete"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StagedMutations {
    pub(crate) entities: BTreeMap<String, EntityMutation>,
    pub(crate) resources: BTreeMap<ResourceKey, ResourceMutation>,
}

impl StagedMutations {
    pub(crate) fn len(&self) -> usize {
        self.entities.len() + self.resources.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.resources.is_empty()
    }

    /// Returns `true` if a staged delete hides `path`: either `path` itself
    /// or one of its ancestors is staged for deletion and `path` has not
    /// been saved again since.
    pub(crate) fn is_deleted(&self, entity_path: &str) -> bool {
        match self.entities.get(entity_path) {
            Some(EntityMutation::Save(_)) => return false,
            Some(EntityMutation::Delete) => return true,
            None => {}
        }
        let mut current = path::parent(entity_path);
        while let Some(ancestor) = current {
            if ancestor == path::ROOT {
                break;
            }
            if matches!(self.entities.get(&ancestor), Some(EntityMutation::Delete)) {
                return true;
            }
            current = path::parent(&ancestor);
        }
        false
    }

    /// Drop every staged mutation at or below `entity_path`.
    pub(crate) fn discard_under(&mut self, entity_path: &str) {
        self.entities.retain(|p, _| !path::is_under(p, entity_path));
        self.resources
            .retain(|(p, _), _| !path::is_under(p, entity_path));
    }

    /// Staged saves of direct children of `entity_path`.
    pub(crate) fn saved_children<'a>(
        &'a self,
        entity_path: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.entities.iter().filter_map(move |(p, m)| {
            let is_child = path::parent(p).as_deref() == Some(entity_path);
            (is_child && matches!(m, EntityMutation::Save(_))).then_some(p.as_str())
        })
    }

    /// Staged resource mutations of one entity.
    pub(crate) fn resources_of<'a>(
        &'a self,
        entity_path: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ResourceMutation)> + 'a {
        self.resources
            .iter()
            .filter(move |((p, _), _)| p == entity_path)
            .map(|((_, name), m)| (name.as_str(), m))
    }

    /// Consume the staged state into an ordered plan.
    pub(crate) fn into_plan(self, layout: &Layout) -> Vec<PlannedStep> {
        let mut copies: Vec<PlannedStep> = Vec::new();
        let mut resource_deletes: Vec<PlannedStep> = Vec::new();
        let mut writes: Vec<PlannedStep> = Vec::new();
        for ((entity_path, name), mutation) in self.resources {
            let target = layout.resource(&entity_path, &name);
            let change_path = path::join(&entity_path, &name);
            let (bucket, action, kind) = match mutation {
                ResourceMutation::CopyFrom(from) => (
                    &mut copies,
                    StepAction::Copy { from, to: target },
                    ChangeKind::ResourceSaved,
                ),
                ResourceMutation::Delete => (
                    &mut resource_deletes,
                    StepAction::Remove { target },
                    ChangeKind::ResourceDeleted,
                ),
                ResourceMutation::Bytes(data) => (
                    &mut writes,
                    StepAction::Write {
                        target,
                        content: ResourceContent::Bytes(data),
                    },
                    ChangeKind::ResourceSaved,
                ),
                ResourceMutation::Stream(reader) => (
                    &mut writes,
                    StepAction::Write {
                        target,
                        content: ResourceContent::Stream(reader),
                    },
                    ChangeKind::ResourceSaved,
                ),
            };
            bucket.push(PlannedStep {
                action,
                change: Change::new(change_path, kind),
            });
        }

        let mut entity_deletes = Vec::new();
        let mut saves = Vec::new();
        for (entity_path, mutation) in self.entities {
            match mutation {
                EntityMutation::Delete => entity_deletes.push(entity_path),
                EntityMutation::Save(entity) => saves.push((entity_path, entity)),
            }
        }
        // Both lists come out of the map in path order; the sorts are stable.
        entity_deletes.sort_by_key(|p| std::cmp::Reverse(path::depth(p)));
        saves.sort_by_key(|(p, _)| path::depth(p));

        let mut plan = copies;
        plan.append(&mut resource_deletes);
        plan.extend(entity_deletes.into_iter().map(|entity_path| PlannedStep {
            action: StepAction::Remove {
                target: layout.record(&entity_path),
            },
            change: Change::new(entity_path, ChangeKind::EntityDeleted),
        }));
        plan.append(&mut writes);
        plan.extend(saves.into_iter().map(|(entity_path, entity)| PlannedStep {
            action: StepAction::Save {
                target: layout.record(&entity_path),
                entity,
            },
            change: Change::new(entity_path, ChangeKind::EntitySaved),
        }));
        plan
    }
}

pub(crate) enum ResourceContent {
    Bytes(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

/// Store operation of one plan step.
pub(crate) enum StepAction {
    Copy { from: String, to: String },
    Remove { target: String },
    Write { target: String, content: ResourceContent },
    Save { target: String, entity: Entity },
}

/// One store operation plus the change it reports once applied.
pub(crate) struct PlannedStep {
    pub(crate) action: StepAction,
    pub(crate) change: Change,
}
