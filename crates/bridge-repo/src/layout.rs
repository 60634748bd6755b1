//! Mapping from entity paths to store paths.

use bridge_types::path;

use crate::config::RepositoryConfig;

#[derive(Clone, Debug)]
pub(crate) struct Layout {
    root: String,
    object_name: String,
}

impl Layout {
    pub(crate) fn new(config: &RepositoryConfig) -> Self {
        Self {
            root: path::normalize(&config.storage_root),
            object_name: config.entity_object_name.clone(),
        }
    }

    pub(crate) fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Store container holding the entity, its resources and its children.
    pub(crate) fn container(&self, entity_path: &str) -> String {
        path::join(&self.root, entity_path)
    }

    /// Store object holding the serialized entity.
    pub(crate) fn record(&self, entity_path: &str) -> String {
        path::join(&self.container(entity_path), &self.object_name)
    }

    pub(crate) fn resource(&self, entity_path: &str, name: &str) -> String {
        path::join(&self.container(entity_path), name)
    }
}
