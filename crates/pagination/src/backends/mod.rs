//! Query executor implementations.
//!
//! # Available Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (always) | In-process store for development and tests; field queries only |
//! | MongoDB | `mongodb` | `find` for field queries, Atlas Search for search-backed lists |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "mongodb")]
//! use strata_pagination::backends::mongodb::{MongoBackend, MongoConfig};
//!
//! # #[cfg(feature = "mongodb")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = MongoBackend::connect(MongoConfig::new("mongodb://localhost:27017", "app")).await?;
//! # Ok(())
//! # }
//! ```

pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongodb;
