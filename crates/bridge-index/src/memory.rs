//! In-memory index engine for tests and embedding.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::document::{DocId, Document, Term};
use crate::error::IndexResult;
use crate::traits::IndexEngine;

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<DocId, Document>,
    next_id: u64,
}

/// An in-memory implementation of [`IndexEngine`].
///
/// Term lookups are linear scans over stored documents, which is fine for
/// the document counts tests and small embedded deployments deal with.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    inner: RwLock<Inner>,
}

impl InMemoryIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document and return its id.
    pub fn add_document(&self, document: Document) -> DocId {
        let mut inner = self.inner.write().expect("lock poisoned");
        let id = DocId(inner.next_id);
        inner.next_id += 1;
        inner.documents.insert(id, document);
        id
    }

    /// Delete a document. Returns `true` if it existed.
    pub fn delete_document(&self, id: DocId) -> bool {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.documents.remove(&id).is_some()
    }

    /// Delete every document containing `term`. Returns the number removed.
    pub fn delete_documents(&self, term: &Term) -> usize {
        let mut inner = self.inner.write().expect("lock poisoned");
        let before = inner.documents.len();
        inner.documents.retain(|_, doc| !doc.matches(term));
        before - inner.documents.len()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").documents.len()
    }

    /// Returns `true` if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IndexEngine for InMemoryIndex {
    fn term_documents(&self, term: &Term) -> IndexResult<Vec<DocId>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .documents
            .iter()
            .filter(|(_, doc)| doc.matches(term))
            .map(|(id, _)| *id)
            .collect())
    }

    fn get_document(&self, id: DocId) -> IndexResult<Option<Document>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.documents.get(&id).cloned())
    }
}
