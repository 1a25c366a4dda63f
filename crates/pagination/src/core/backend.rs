//! Query executor abstraction.
//!
//! This module defines the [`QueryExecutor`] trait, the seam between the
//! query builders and a database driver. Builders produce plain BSON; an
//! executor runs it and hands back raw rows.

use std::fmt::Debug;

use async_trait::async_trait;
use bson::Document;

use crate::error::{BackendError, PaginationResult};
use crate::query::FieldQuery;

/// Identifies the type of database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process document store.
    Memory,
    /// MongoDB, with Atlas Search for search-backed lists.
    MongoDB,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::MongoDB => write!(f, "mongodb"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Capabilities that an executor may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCapability {
    /// Filter/sort/limit queries.
    FieldQuery,
    /// `$search` aggregation pipelines.
    FullTextSearch,
}

impl std::fmt::Display for BackendCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendCapability::FieldQuery => "field-query",
            BackendCapability::FullTextSearch => "full-text-search",
        };
        write!(f, "{}", name)
    }
}

/// Runs built queries against a database.
///
/// Implementations hold their own connection pool and must be safe to share
/// across tasks. They do not retry: every driver failure is returned as a
/// [`BackendError`]. The paginator consults [`supports`](Self::supports)
/// before building a query, so an executor is only handed work it declared.
///
/// # Example
///
/// ```ignore
/// use strata_pagination::core::{BackendCapability, QueryExecutor};
///
/// if executor.supports(BackendCapability::FullTextSearch) {
///     let rows = executor.aggregate("posts", &pipeline.stages).await?;
/// }
/// ```
#[async_trait]
pub trait QueryExecutor: Send + Sync + Debug {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Returns all capabilities supported by this backend.
    fn capabilities(&self) -> Vec<BackendCapability>;

    /// Checks if this backend supports the given capability.
    fn supports(&self, capability: BackendCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Runs a filter/sort/limit query and returns the matching rows in order.
    async fn find(&self, query: &FieldQuery) -> PaginationResult<Vec<Document>>;

    /// Runs an aggregation pipeline and returns the output rows in order.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> PaginationResult<Vec<Document>>;

    /// Checks if the backend is reachable.
    async fn health_check(&self) -> Result<(), BackendError>;
}
