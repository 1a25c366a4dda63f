//! Core value types for paginated reads.
//!
//! - [`CursorValue`] - typed scalar used as a resume position and filter operand
//! - [`PageToken`] - opaque bundle of filters, sorts and position
//! - [`PaginationRequest`], [`PaginationSlice`] - request/response envelope
//!
//! # Examples
//!
//! ```
//! use strata_pagination::types::{FilterField, PageToken, PaginationRequest, SortField};
//!
//! let token = PageToken::new()
//!     .with_filter(FilterField::in_list("status", ["published", "archived"]))
//!     .with_sort(SortField::desc("createdAt"));
//!
//! let encoded = token.encode().unwrap();
//! let request = PaginationRequest::new(20).with_token(PageToken::decode(&encoded).unwrap());
//! assert_eq!(request.page_token, token);
//! ```

mod cursor;
mod request;
mod token;

pub use cursor::{CursorType, CursorValue, UnsupportedCursorValue};

pub use request::{
    NEXT_PAGE_TOKEN_HEADER, PAGE_SIZE_HEADER, PAGE_SIZE_PARAM, PAGE_TOKEN_PARAM,
    PaginationRequest, PaginationSlice, Scored,
};

pub use token::{
    FilterField, FilterOperator, FilterValue, PageToken, SortDirection, SortField,
};
