//! Strata Pagination Layer
//!
//! This crate turns client-facing list requests into safe, keyset-paginated
//! database reads. It covers two kinds of list endpoints:
//!
//! - **Field-backed lists**: filters and sorts over declared entity fields,
//!   resumed with a seek predicate on the last row's sort values.
//! - **Search-backed lists**: a full-text `$search` pipeline with fuzzy
//!   matching, score boosts and proximity decay, resumed with the search
//!   engine's own continuation marker.
//!
//! Both return a [`PaginationSlice`] of items plus an opaque [`PageToken`]
//! for the next page, if there is one.
//!
//! # Backend Features
//!
//! ```toml
//! [dependencies]
//! strata-pagination = { version = "0.1", features = ["mongodb"] }
//! ```
//!
//! - `mongodb` - MongoDB driver and Atlas Search pipelines
//! - `probe` - the `page-probe` operator CLI
//!
//! Without features, only the in-memory backend is available.
//!
//! # Architecture
//!
//! - [`types`] - cursor values, page tokens, request/response envelopes
//! - [`entity`] - per-entity field declarations and validation
//! - [`query`] - field-query builder and seek predicates
//! - [`search`] - search configuration and pipeline builder
//! - [`core`] - the [`QueryExecutor`] trait
//! - [`backends`] - executor implementations
//! - [`paginator`] - [`Paginator`], which ties builders and executors together
//! - [`config`] - configuration
//! - [`error`] - error types
//!
//! # Quick Start
//!
//! ```
//! use bson::doc;
//! use strata_pagination::backends::memory::MemoryStore;
//! use strata_pagination::entity::EntityShape;
//! use strata_pagination::types::{FilterField, PageToken, PaginationRequest, SortField};
//! use strata_pagination::Paginator;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! store.insert_many(
//!     "posts",
//!     ["A", "B", "C", "D"].into_iter().map(|s| doc! { "status": s }),
//! );
//!
//! let shape = EntityShape::new("Post", "posts").with_attribute("status");
//! let paginator = Paginator::new(store);
//!
//! let token = PageToken::new()
//!     .with_filter(FilterField::in_list("status", ["A", "C"]))
//!     .with_sort(SortField::asc("status"));
//! let page = paginator
//!     .get_page(&shape, &PaginationRequest::new(10).with_token(token))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(page.len(), 2);
//! assert!(!page.has_next());
//! # });
//! ```
//!
//! # Page Tokens
//!
//! Tokens are opaque to clients. They carry the filters and sorts of the
//! original request, so a client resumes by sending only the token back.
//! Tokens never contain storage paths: fields are named logically and
//! re-validated against the entity declaration on every request.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod entity;
pub mod error;
pub mod paginator;
pub mod query;
pub mod search;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{PaginationConfig, SearchSettings, SeekStrategy};
pub use entity::{EntityShape, PagedEntity};
pub use error::{PaginationError, PaginationResult};
pub use paginator::Paginator;
pub use types::{CursorValue, PageToken, PaginationRequest, PaginationSlice, Scored};

// Re-export core traits
pub use core::{BackendKind, QueryExecutor};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
