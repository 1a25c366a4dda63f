//! In-memory backend.
//!
//! [`MemoryStore`] runs field queries over documents held in a
//! `parking_lot::RwLock`. It has no search engine: search pipelines return
//! an unsupported-capability error.

mod backend;
mod matcher;

pub use backend::MemoryStore;
pub use matcher::{compare, compare_by, matches};
