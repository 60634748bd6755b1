use crate::document::{DocId, Document, Term};
use crate::error::IndexResult;

/// Read surface of a full-text index engine.
///
/// The bridge never mutates the engine through this trait. Populating the
/// index is the job of the content-indexing collaborator.
pub trait IndexEngine: Send + Sync {
    /// Ids of every document containing `term`, in engine order.
    ///
    /// Returns an empty list when nothing matches.
    fn term_documents(&self, term: &Term) -> IndexResult<Vec<DocId>>;

    /// Fetch a stored document by id.
    ///
    /// Returns `Ok(None)` if the id is unknown (e.g. deleted since lookup).
    fn get_document(&self, id: DocId) -> IndexResult<Option<Document>>;
}
