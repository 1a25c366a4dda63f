//! Request and response envelopes shared by every list endpoint.

use crate::config::PaginationConfig;
use crate::error::{PaginationResult, TokenError, ValidationError};

use super::token::PageToken;

/// Query parameter carrying the opaque page token.
pub const PAGE_TOKEN_PARAM: &str = "pageToken";

/// Query parameter carrying the requested page size.
pub const PAGE_SIZE_PARAM: &str = "pageSize";

/// Response header echoing the token for the next page.
pub const NEXT_PAGE_TOKEN_HEADER: &str = "X-Next-Page-Token";

/// Response header carrying the number of items returned.
pub const PAGE_SIZE_HEADER: &str = "X-Page-Size";

/// A request for one page of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationRequest {
    /// Maximum number of items to return.
    pub limit: u32,

    /// Filters, sorts and position.
    pub page_token: PageToken,
}

impl PaginationRequest {
    /// Creates a request for the first page.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            page_token: PageToken::default(),
        }
    }

    /// Sets the page token.
    pub fn with_token(mut self, token: PageToken) -> Self {
        self.page_token = token;
        self
    }

    /// Parses the page-size and page-token query parameters.
    ///
    /// A missing page size falls back to the configured default; a larger
    /// one is clamped to the configured maximum. A present but malformed
    /// token is an error rather than a silent restart from the first page.
    pub fn from_params(
        page_size: Option<&str>,
        page_token: Option<&str>,
        config: &PaginationConfig,
    ) -> PaginationResult<Self> {
        let limit = match page_size.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(limit) if limit > 0 => limit.min(config.max_limit),
                _ => {
                    return Err(ValidationError::InvalidLimit {
                        limit: raw.to_string(),
                    }
                    .into());
                }
            },
            None => config.default_limit,
        };

        let page_token = match page_token.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => PageToken::decode(raw)?,
            None => PageToken::default(),
        };

        Ok(Self { limit, page_token })
    }
}

/// A page of results plus the token for the next page, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationSlice<T> {
    /// The items in this page.
    pub items: Vec<T>,

    /// The token for the next page; `None` on the last page.
    pub next_page_token: Option<PageToken>,
}

impl<T> PaginationSlice<T> {
    /// Creates a new slice.
    pub fn new(items: Vec<T>, next_page_token: Option<PageToken>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }

    /// Creates an empty final slice.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_page_token: None,
        }
    }

    /// Returns true if another page exists.
    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }

    /// Returns true if this page has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Maps the items to a different type.
    pub fn map<U, F>(self, f: F) -> PaginationSlice<U>
    where
        F: FnMut(T) -> U,
    {
        PaginationSlice {
            items: self.items.into_iter().map(f).collect(),
            next_page_token: self.next_page_token,
        }
    }

    /// Returns the encoded next page token.
    pub fn encoded_next_token(&self) -> Result<Option<String>, TokenError> {
        self.next_page_token
            .as_ref()
            .map(PageToken::encode)
            .transpose()
    }

    /// Renders the pagination response headers.
    pub fn response_headers(&self) -> Result<Vec<(&'static str, String)>, TokenError> {
        let mut headers = vec![(PAGE_SIZE_HEADER, self.items.len().to_string())];
        if let Some(token) = self.encoded_next_token()? {
            headers.push((NEXT_PAGE_TOKEN_HEADER, token));
        }
        Ok(headers)
    }
}

impl<T> Default for PaginationSlice<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// A search hit with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    /// The matched item.
    pub item: T,

    /// The engine's relevance score.
    pub score: f64,
}
