//! Bidirectional identifier/path cache.
//!
//! The cache is advisory: the index engine is the source of truth. A miss
//! triggers a read-only point lookup in the engine and is never an error by
//! itself. Both directions live under one lock and are always updated
//! together, so at most one path maps to an identifier and at most one
//! identifier maps to a path.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bridge_types::Identifier;
use tracing::{debug, warn};

use crate::document::{Term, IDENTIFIER_FIELD, PATH_FIELD};
use crate::error::{IndexError, IndexResult};
use crate::traits::IndexEngine;

#[derive(Debug, Default)]
struct Mappings {
    by_identifier: HashMap<Identifier, String>,
    by_path: HashMap<String, Identifier>,
}

impl Mappings {
    fn insert(&mut self, identifier: Identifier, path: String) {
        if let Some(stale_path) = self.by_identifier.remove(&identifier) {
            self.by_path.remove(&stale_path);
        }
        if let Some(stale_identifier) = self.by_path.remove(&path) {
            self.by_identifier.remove(&stale_identifier);
        }
        self.by_identifier.insert(identifier.clone(), path.clone());
        self.by_path.insert(path, identifier);
    }
}

/// Identifier <-> path cache backed by an [`IndexEngine`].
pub struct IdentifierCache {
    engine: Arc<dyn IndexEngine>,
    mappings: RwLock<Mappings>,
}

impl IdentifierCache {
    /// Create an empty cache resolving misses through `engine`.
    pub fn new(engine: Arc<dyn IndexEngine>) -> Self {
        Self {
            engine,
            mappings: RwLock::new(Mappings::default()),
        }
    }

    /// Current path of the entity with `identifier`, or `None` if the
    /// engine knows no such entity.
    pub fn get_path(&self, identifier: &Identifier) -> IndexResult<Option<String>> {
        if let Some(path) = self.read().by_identifier.get(identifier) {
            return Ok(Some(path.clone()));
        }
        debug!(%identifier, "identifier cache miss");
        let term = Term::new(IDENTIFIER_FIELD, identifier.as_str());
        let Some(path) = self.lookup(&term, PATH_FIELD)? else {
            return Ok(None);
        };
        self.set(identifier.clone(), path.clone());
        Ok(Some(path))
    }

    /// Identifier of the entity stored at `path`, or `None` if the engine
    /// knows no entity there.
    pub fn get_identifier(&self, path: &str) -> IndexResult<Option<Identifier>> {
        if let Some(identifier) = self.read().by_path.get(path) {
            return Ok(Some(identifier.clone()));
        }
        debug!(path, "path cache miss");
        let term = Term::new(PATH_FIELD, path);
        let Some(value) = self.lookup(&term, IDENTIFIER_FIELD)? else {
            return Ok(None);
        };
        let identifier = Identifier::new(&value).map_err(|source| IndexError::InvalidField {
            field: IDENTIFIER_FIELD.to_string(),
            source,
        })?;
        self.set(identifier.clone(), path.to_string());
        Ok(Some(identifier))
    }

    /// Insert or overwrite a pair, evicting any stale pair that held either
    /// half.
    pub fn set(&self, identifier: Identifier, path: impl Into<String>) {
        self.write().insert(identifier, path.into());
    }

    /// Drop the pair holding `identifier`, if cached.
    pub fn remove_by_identifier(&self, identifier: &Identifier) {
        let mut mappings = self.write();
        if let Some(path) = mappings.by_identifier.remove(identifier) {
            mappings.by_path.remove(&path);
        }
    }

    /// Drop the pair holding `path`, if cached.
    pub fn remove_by_path(&self, path: &str) {
        let mut mappings = self.write();
        if let Some(identifier) = mappings.by_path.remove(path) {
            mappings.by_identifier.remove(&identifier);
        }
    }

    /// Number of cached pairs.
    pub fn len(&self) -> usize {
        self.read().by_identifier.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached pair.
    pub fn clear(&self) {
        let mut mappings = self.write();
        mappings.by_identifier.clear();
        mappings.by_path.clear();
    }

    /// First document matching `term`, projected onto `field`.
    fn lookup(&self, term: &Term, field: &str) -> IndexResult<Option<String>> {
        let Some(doc_id) = self.engine.term_documents(term)?.into_iter().next() else {
            return Ok(None);
        };
        let Some(document) = self.engine.get_document(doc_id)? else {
            return Ok(None);
        };
        match document.field_value(field) {
            Some(value) => Ok(Some(value.to_string())),
            None => {
                warn!(doc = %doc_id, field, "indexed entity document lacks field");
                Ok(None)
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Mappings> {
        self.mappings.read().expect("lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Mappings> {
        self.mappings.write().expect("lock poisoned")
    }
}

impl std::fmt::Debug for IdentifierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierCache")
            .field("cached", &self.len())
            .finish()
    }
}
