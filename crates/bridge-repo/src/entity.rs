//! Domain entity record.

use std::collections::BTreeMap;

use bridge_index::{Document, IDENTIFIER_FIELD, PATH_FIELD};
use bridge_types::{path, Identifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RepositoryError, RepositoryResult};

/// Index field holding the entity kind.
pub const KIND_FIELD: &str = "kind";

/// A domain entity stored at a hierarchical path.
///
/// The identifier is stable across moves; the path is the mutable location.
/// Domain data lives in the free-form `properties` map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub identifier: Identifier,
    /// Unset until the entity is given a location.
    pub path: Option<String>,
    /// Type name, matched by the children type filter.
    pub kind: String,
    #[serde(default = "default_searchable")]
    pub searchable: bool,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_by: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

fn default_searchable() -> bool {
    true
}

impl Entity {
    /// A new entity of `kind` at `path` with a freshly generated identifier.
    pub fn new(kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            identifier: Identifier::generate(),
            path: Some(path.into()),
            kind: kind.into(),
            searchable: true,
            created: None,
            created_by: None,
            modified: None,
            modified_by: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// The path, validated as an entity path.
    pub fn path_str(&self) -> RepositoryResult<&str> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| RepositoryError::InvalidPath("entity path is not set".to_string()))?;
        path::validate_entity_path(path)?;
        Ok(path)
    }

    /// Last path segment, or `""` when the path is unset.
    pub fn name(&self) -> &str {
        self.path.as_deref().map(path::name).unwrap_or("")
    }

    pub fn depth(&self) -> usize {
        self.path.as_deref().map(path::depth).unwrap_or(0)
    }

    /// Returns `true` if the entity lies at or below `ancestor`.
    pub fn is_under(&self, ancestor: &str) -> bool {
        self.path
            .as_deref()
            .is_some_and(|p| path::is_under(p, ancestor))
    }

    /// Index document carrying the fields the identifier cache resolves
    /// through, plus the kind.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new()
            .with_field(IDENTIFIER_FIELD, self.identifier.as_str())
            .with_field(KIND_FIELD, self.kind.as_str());
        if let Some(path) = &self.path {
            document.set_field(PATH_FIELD, path.as_str());
        }
        document
    }
}
