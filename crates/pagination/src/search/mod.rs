//! Full-text search with relevance scoring.
//!
//! A search-backed list runs one aggregation per page:
//!
//! ```text
//! $search     text (no configuration) or compound { must, should, filter }
//!             + sort, searchAfter
//! $addFields  score <- searchScore, paginationToken <- searchSequenceToken
//! $limit      min(limit, max_page_size) + 1
//! ```
//!
//! - [`SearchConfiguration`] - text fields, fuzziness, boosts, proximity
//! - [`Score`], [`ScoreExpression`] - score modifiers
//! - [`NearField`] - date, numeric and geo proximity clauses
//! - [`SearchIndexDefinition`] - declarative index mapping
//! - [`SearchPipelineBuilder`] - renders the pipeline and splits results

mod config;
mod filters;
mod near;
mod pipeline;
mod score;

pub use config::{
    IndexedField, IndexedFieldKind, ScoreBoost, SearchConfiguration, SearchIndexDefinition,
};
pub use filters::filter_clause;
pub use near::{GeoPoint, NearField};
pub use pipeline::{SearchPipeline, SearchPipelineBuilder};
pub use score::{Score, ScoreExpression};
