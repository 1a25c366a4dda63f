//! Core executor trait.
//!
//! - [`QueryExecutor`] - runs field queries and search pipelines
//! - [`BackendKind`], [`BackendCapability`] - runtime capability discovery
//!
//! The query builders never talk to a database directly: they render BSON,
//! and a [`QueryExecutor`] runs it. The [`Paginator`](crate::Paginator) ties
//! the two together.

mod backend;

pub use backend::{BackendCapability, BackendKind, QueryExecutor};
