//! Keyset-paginated field queries.
//!
//! [`FieldQueryBuilder`] turns a [`PageToken`](crate::types::PageToken) into a
//! [`FieldQuery`]: a filter document (token filters plus the seek predicate),
//! a sort document ending with the identity tie-breaker, and a limit one
//! larger than the page size. The extra row tells whether another page
//! exists without a separate count.

mod builder;
pub mod document;
mod seek;

pub use builder::{FieldQuery, FieldQueryBuilder};
pub use seek::{SeekKey, seek_predicate};
