//! Error types for the pagination layer.
//!
//! Errors are split by where they originate: field validation (raised before
//! any query runs), page token decoding, search configuration, and the backend
//! that executes the query. None of them are retried by this crate.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// The primary error type for all pagination operations.
#[derive(Error, Debug)]
pub enum PaginationError {
    /// Field or request validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Page token decoding errors
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Search configuration and continuation errors
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The paginator configuration is inconsistent
    #[error("invalid pagination configuration: {}", .errors.join("; "))]
    Configuration { errors: Vec<String> },
}

impl PaginationError {
    /// Returns true when the error was caused by client input and maps to a
    /// 4xx-style response at the HTTP layer.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PaginationError::Validation(_)
                | PaginationError::Token(
                    TokenError::Malformed { .. } | TokenError::UnsupportedVersion { .. }
                )
                | PaginationError::Search(SearchError::EmptyQuery)
        )
    }

    /// Returns true when repeating the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PaginationError::Backend(
                BackendError::Unavailable { .. } | BackendError::ConnectionFailed { .. }
            )
        )
    }
}

/// How a field is used by a request, reported in validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldUsage {
    /// The field appears in the sort fields.
    Sorting,
    /// The field appears in a filter.
    Filtering,
    /// The field appears as a cursor key.
    CursorPagination,
    /// The field appears in a search configuration.
    SearchScoring,
}

impl fmt::Display for FieldUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldUsage::Sorting => write!(f, "sorting"),
            FieldUsage::Filtering => write!(f, "filtering"),
            FieldUsage::CursorPagination => write!(f, "cursor pagination"),
            FieldUsage::SearchScoring => write!(f, "search scoring"),
        }
    }
}

/// Errors raised while validating a request against an entity shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The field is neither mapped nor a declared attribute of the entity.
    #[error("unknown field '{field}' on {entity} used for {usage}")]
    UnknownField {
        field: String,
        entity: String,
        usage: FieldUsage,
    },

    /// The field exists but may not be used for sorting, filtering or cursors.
    #[error("field '{field}' on {entity} is not allowed for {usage}")]
    ExcludedField {
        field: String,
        entity: String,
        usage: FieldUsage,
    },

    /// A cursor value was supplied for a field that is not being sorted on.
    #[error("cursor field '{field}' on {entity} is not an active sort field")]
    CursorWithoutSort { field: String, entity: String },

    /// The requested page size is not a positive integer.
    #[error("invalid page size: {limit}")]
    InvalidLimit { limit: String },

    /// The filter operand does not fit the operator.
    #[error("invalid operand for {operator} filter on '{field}': {message}")]
    InvalidOperand {
        field: String,
        operator: String,
        message: String,
    },

    /// The static entity declaration is inconsistent.
    #[error("invalid entity declaration {entity}: {message}")]
    InvalidEntity { entity: String, message: String },
}

/// Errors raised while decoding a page token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token is not valid base64 or does not contain a valid payload.
    #[error("malformed page token: {message}")]
    Malformed { token: String, message: String },

    /// The token was produced by an incompatible encoder version.
    #[error("unsupported page token version: {version}")]
    UnsupportedVersion { version: u8 },

    /// The token could not be serialized.
    #[error("page token cannot be encoded: {message}")]
    Unencodable { message: String },
}

/// Errors related to full-text search.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The scoring configuration cannot be turned into a search stage.
    #[error("invalid search configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The search phrase is empty after trimming.
    #[error("search text must not be empty")]
    EmptyQuery,

    /// A result row came back without the engine continuation marker.
    #[error("search result is missing continuation field '{field}'")]
    MissingContinuation { field: String },
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// The requested capability is not supported by this backend.
    #[error("capability '{capability}' not supported by {backend_name}")]
    UnsupportedCapability {
        backend_name: String,
        capability: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error, including engine-side rejections.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for pagination operations.
pub type PaginationResult<T> = Result<T, PaginationError>;

/// Result type alias for field validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type alias for search configuration handling.
pub type SearchResult<T> = Result<T, SearchError>;

impl From<bson::de::Error> for PaginationError {
    fn from(err: bson::de::Error) -> Self {
        PaginationError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<bson::ser::Error> for PaginationError {
    fn from(err: bson::ser::Error) -> Self {
        PaginationError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for PaginationError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        let backend_name = "mongodb".to_string();
        let error = match *err.kind {
            ErrorKind::ServerSelection { ref message, .. } => BackendError::Unavailable {
                backend_name,
                message: message.clone(),
            },
            ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } => {
                BackendError::ConnectionFailed {
                    backend_name,
                    message: err.to_string(),
                }
            }
            ErrorKind::Command(ref command) => BackendError::QueryError {
                message: format!("{} ({})", command.message, command.code_name),
            },
            _ => BackendError::Internal {
                backend_name,
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
        };
        PaginationError::Backend(error)
    }
}
