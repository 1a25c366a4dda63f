//! MongoDB backend.
//!
//! Field queries run as `find` with filter, sort and limit. Search-backed
//! lists run as aggregations whose first stage is `$search`, which requires
//! an Atlas Search index (or a local Atlas deployment).

mod backend;

pub use backend::{MongoBackend, MongoConfig};
