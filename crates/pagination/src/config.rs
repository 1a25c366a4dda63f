//! Pagination configuration.
//!
//! All fields have serde defaults so a partial document (or an empty one)
//! deserializes into a usable configuration.
//!
//! ```
//! use strata_pagination::config::{PaginationConfig, SeekStrategy};
//!
//! let config: PaginationConfig =
//!     serde_json::from_str(r#"{ "max_limit": 50, "search": { "max_page_size": 25 } }"#).unwrap();
//! assert_eq!(config.default_limit, 20);
//! assert_eq!(config.max_limit, 50);
//! assert_eq!(config.search.max_page_size, 25);
//! assert_eq!(config.seek_strategy, SeekStrategy::Lexicographic);
//! ```

use serde::{Deserialize, Serialize};

/// How the resume predicate is built from cursor values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeekStrategy {
    /// Tuple comparison over all sort fields plus the tie-breaker:
    /// `(f1 > v1) OR (f1 = v1 AND f2 > v2) OR ...`.
    #[default]
    Lexicographic,

    /// One independent strict comparison per sorted field, ORed together.
    ///
    /// Matches the behavior of older deployments. With more than one sort
    /// field it can skip or repeat rows that tie on the primary field.
    PerFieldOr,
}

/// Settings for search-backed lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Largest page the search engine is asked for (default: 10).
    #[serde(default = "default_search_max_page_size")]
    pub max_page_size: u32,

    /// Fuzzy edit distance used when a configuration does not set one (default: 2).
    #[serde(default = "default_max_edits")]
    pub default_max_edits: u8,

    /// Result field receiving the relevance score (default: "score").
    #[serde(default = "default_score_field")]
    pub score_field: String,

    /// Result field receiving the continuation marker (default: "paginationToken").
    #[serde(default = "default_token_field")]
    pub token_field: String,
}

fn default_search_max_page_size() -> u32 {
    10
}

fn default_max_edits() -> u8 {
    2
}

fn default_score_field() -> String {
    "score".to_string()
}

fn default_token_field() -> String {
    "paginationToken".to_string()
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_page_size: default_search_max_page_size(),
            default_max_edits: default_max_edits(),
            score_field: default_score_field(),
            token_field: default_token_field(),
        }
    }
}

/// Configuration for the paginator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when the client does not ask for one (default: 20).
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Largest page size a field-backed list returns (default: 100).
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Resume predicate construction (default: lexicographic).
    #[serde(default)]
    pub seek_strategy: SeekStrategy,

    /// Search-backed list settings.
    #[serde(default)]
    pub search: SearchSettings,
}

fn default_limit() -> u32 {
    20
}

fn default_max_limit() -> u32 {
    100
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            seek_strategy: SeekStrategy::default(),
            search: SearchSettings::default(),
        }
    }
}

impl PaginationConfig {
    /// Sets the seek strategy.
    pub fn with_seek_strategy(mut self, strategy: SeekStrategy) -> Self {
        self.seek_strategy = strategy;
        self
    }

    /// Sets the search engine page size cap.
    pub fn with_search_max_page_size(mut self, max: u32) -> Self {
        self.search.max_page_size = max;
        self
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.default_limit == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.max_limit == 0 {
            errors.push("Max page size cannot be 0".to_string());
        }

        if self.default_limit > self.max_limit {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if self.search.max_page_size == 0 {
            errors.push("Search max page size cannot be 0".to_string());
        }

        if !(1..=2).contains(&self.search.default_max_edits) {
            errors.push("Search fuzzy max edits must be 1 or 2".to_string());
        }

        if self.search.score_field.is_empty() || self.search.token_field.is_empty() {
            errors.push("Search metadata field names cannot be empty".to_string());
        }

        if self.search.score_field == self.search.token_field {
            errors.push("Search score and token fields must differ".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
