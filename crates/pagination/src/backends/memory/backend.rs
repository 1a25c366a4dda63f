//! In-memory executor implementation.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::Document;
use parking_lot::RwLock;

use crate::core::{BackendCapability, BackendKind, QueryExecutor};
use crate::error::{BackendError, PaginationResult};
use crate::query::FieldQuery;

use super::matcher::{compare_by, matches};

/// Document store held in process memory.
///
/// Evaluates field queries the way the database would for the operators the
/// builder emits. Search pipelines are not supported. Useful for local
/// development and tests; every `find` is counted.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    queries: AtomicUsize,
}

impl Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.collections.read();
        f.debug_struct("MemoryStore")
            .field("collections", &collections.len())
            .field("queries", &self.queries.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document, assigning an `_id` if it has none.
    ///
    /// Returns the document's `_id`.
    pub fn insert(&self, collection: &str, mut document: Document) -> bson::Bson {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = document.get("_id").cloned().unwrap_or(bson::Bson::Null);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(document);
        id
    }

    /// Inserts several documents.
    pub fn insert_many<I>(&self, collection: &str, documents: I)
    where
        I: IntoIterator<Item = Document>,
    {
        for document in documents {
            self.insert(collection, document);
        }
    }

    /// Returns the number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Returns true if the collection is empty or missing.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Number of queries executed so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Resets the query counter.
    pub fn reset_query_count(&self) {
        self.queries.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueryExecutor for MemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Vec<BackendCapability> {
        vec![BackendCapability::FieldQuery]
    }

    async fn find(&self, query: &FieldQuery) -> PaginationResult<Vec<Document>> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let collections = self.collections.read();
        let Some(documents) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::new();
        for document in documents {
            if matches(document, &query.filter)? {
                rows.push(document.clone());
            }
        }

        rows.sort_by(|a, b| compare_by(a, b, &query.sort));
        if query.limit > 0 {
            rows.truncate(usize::try_from(query.limit).unwrap_or(usize::MAX));
        }

        Ok(rows)
    }

    async fn aggregate(
        &self,
        _collection: &str,
        _pipeline: &[Document],
    ) -> PaginationResult<Vec<Document>> {
        Err(BackendError::UnsupportedCapability {
            backend_name: self.name().to_string(),
            capability: BackendCapability::FullTextSearch.to_string(),
        }
        .into())
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
