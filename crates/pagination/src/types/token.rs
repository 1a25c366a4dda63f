//! Page tokens.
//!
//! A [`PageToken`] bundles everything needed to resume a list query: the
//! active filters, the ordered sort fields, and the values of the last row
//! returned. Clients receive it as an opaque string and hand it back
//! unchanged.
//!
//! # Encoding
//!
//! Tokens are base64url (no padding) encoded JSON containing:
//! - A format version
//! - Filters and sort fields
//! - Per-sort-field cursor values
//! - The identity of the last row (tie-breaker)
//! - The search engine continuation marker, for search-backed lists

use std::collections::BTreeMap;
use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

use super::cursor::CursorValue;

const TOKEN_VERSION: u8 = 1;

/// Direction of a sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    /// Largest first.
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    /// The MongoDB sort specifier for this direction.
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// A field to sort by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    /// Logical field name.
    #[serde(rename = "f")]
    pub field: String,

    /// Sort direction.
    #[serde(rename = "d")]
    pub direction: SortDirection,
}

impl SortField {
    /// Creates an ascending sort field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Creates a descending sort field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parses a sort expression like `createdAt` or `-createdAt` (descending).
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(s.strip_prefix('+').unwrap_or(s)),
        }
    }
}

/// A filter comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    /// Field equals the operand.
    Equals,
    /// Field equals any of the operands.
    In,
    /// Field is strictly less than the operand.
    LessThan,
    /// Field is strictly greater than the operand.
    GreaterThan,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperator::Equals => write!(f, "EQUALS"),
            FilterOperator::In => write!(f, "IN"),
            FilterOperator::LessThan => write!(f, "LESS_THAN"),
            FilterOperator::GreaterThan => write!(f, "GREATER_THAN"),
        }
    }
}

/// The operand of a filter: one value or a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// A single value.
    Single(CursorValue),
    /// A list of values.
    List(Vec<CursorValue>),
}

impl FilterValue {
    /// Returns the operand as a list, wrapping a single value.
    pub fn as_list(&self) -> Vec<&CursorValue> {
        match self {
            FilterValue::Single(value) => vec![value],
            FilterValue::List(values) => values.iter().collect(),
        }
    }

    /// Returns the single value, if this is not a list.
    pub fn as_single(&self) -> Option<&CursorValue> {
        match self {
            FilterValue::Single(value) => Some(value),
            FilterValue::List(_) => None,
        }
    }
}

impl From<CursorValue> for FilterValue {
    fn from(value: CursorValue) -> Self {
        FilterValue::Single(value)
    }
}

impl From<Vec<CursorValue>> for FilterValue {
    fn from(values: Vec<CursorValue>) -> Self {
        FilterValue::List(values)
    }
}

/// A filter on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterField {
    /// Logical field name.
    #[serde(rename = "f")]
    pub field: String,

    /// Comparison operator.
    #[serde(rename = "o")]
    pub operator: FilterOperator,

    /// Operand.
    #[serde(rename = "v")]
    pub value: FilterValue,
}

impl FilterField {
    /// Creates a filter with an explicit operator.
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Creates an `EQUALS` filter.
    pub fn equals(field: impl Into<String>, value: impl Into<CursorValue>) -> Self {
        Self::new(field, FilterOperator::Equals, FilterValue::Single(value.into()))
    }

    /// Creates an `IN` filter over a list of values.
    pub fn in_list<V, I>(field: impl Into<String>, values: I) -> Self
    where
        V: Into<CursorValue>,
        I: IntoIterator<Item = V>,
    {
        Self::new(
            field,
            FilterOperator::In,
            FilterValue::List(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Creates a `LESS_THAN` filter.
    pub fn less_than(field: impl Into<String>, value: impl Into<CursorValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, FilterValue::Single(value.into()))
    }

    /// Creates a `GREATER_THAN` filter.
    pub fn greater_than(field: impl Into<String>, value: impl Into<CursorValue>) -> Self {
        Self::new(
            field,
            FilterOperator::GreaterThan,
            FilterValue::Single(value.into()),
        )
    }
}

/// An opaque, encodable bundle of list-query state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageToken {
    /// Active filters.
    #[serde(rename = "f", default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterField>,

    /// Active sort fields, primary first.
    #[serde(rename = "s", default, skip_serializing_if = "Vec::is_empty")]
    pub sort_fields: Vec<SortField>,

    /// Resume-after values, keyed by sort field name.
    #[serde(rename = "c", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cursors: BTreeMap<String, CursorValue>,

    /// Identity of the last returned row, breaking ties between equal sort keys.
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub tie_breaker: Option<CursorValue>,

    /// Engine-native continuation marker for search-backed lists.
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub search_after: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct EncodedToken {
    #[serde(rename = "v")]
    version: u8,
    #[serde(flatten)]
    token: PageToken,
}

impl PageToken {
    /// Creates an empty token (first page, no filters, no sort).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn with_filter(mut self, filter: FilterField) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a sort field after the existing ones.
    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sort_fields.push(sort);
        self
    }

    /// Sets a cursor value for a sort field.
    pub fn with_cursor(mut self, field: impl Into<String>, value: impl Into<CursorValue>) -> Self {
        self.cursors.insert(field.into(), value.into());
        self
    }

    /// Sets the tie-breaker value.
    pub fn with_tie_breaker(mut self, value: impl Into<CursorValue>) -> Self {
        self.tie_breaker = Some(value.into());
        self
    }

    /// Sets the search continuation marker.
    pub fn with_search_after(mut self, marker: impl Into<String>) -> Self {
        self.search_after = Some(marker.into());
        self
    }

    /// Returns true if this token positions the read after some row.
    pub fn has_position(&self) -> bool {
        !self.cursors.is_empty() || self.tie_breaker.is_some() || self.search_after.is_some()
    }

    /// Returns the cursor value for a sort field.
    pub fn cursor(&self, field: &str) -> Option<&CursorValue> {
        self.cursors.get(field)
    }

    /// Builds the token for the following page: same filters and sorts,
    /// fresh position.
    pub fn next_page_token(
        &self,
        cursors: BTreeMap<String, CursorValue>,
        tie_breaker: Option<CursorValue>,
    ) -> Self {
        Self {
            filters: self.filters.clone(),
            sort_fields: self.sort_fields.clone(),
            cursors,
            tie_breaker,
            search_after: None,
        }
    }

    /// Builds the token for the following page of a search-backed list.
    pub fn next_search_token(&self, marker: impl Into<String>) -> Self {
        Self {
            filters: self.filters.clone(),
            sort_fields: self.sort_fields.clone(),
            cursors: BTreeMap::new(),
            tie_breaker: None,
            search_after: Some(marker.into()),
        }
    }

    /// Encodes the token to an opaque string.
    pub fn encode(&self) -> Result<String, TokenError> {
        let payload = EncodedToken {
            version: TOKEN_VERSION,
            token: self.clone(),
        };
        let json = serde_json::to_vec(&payload).map_err(|e| TokenError::Unencodable {
            message: e.to_string(),
        })?;
        Ok(URL_SAFE_NO_PAD.encode(&json))
    }

    /// Decodes a token from an opaque string.
    pub fn decode(s: &str) -> Result<Self, TokenError> {
        let malformed = |message: String| TokenError::Malformed {
            token: s.to_string(),
            message,
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(s.trim())
            .map_err(|e| malformed(e.to_string()))?;

        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| malformed(e.to_string()))?;

        match value.get("v").and_then(|v| v.as_u64()) {
            Some(v) if v == u64::from(TOKEN_VERSION) => {}
            Some(v) => {
                return Err(TokenError::UnsupportedVersion {
                    version: u8::try_from(v).unwrap_or(u8::MAX),
                });
            }
            None => return Err(malformed("missing token version".to_string())),
        }

        let decoded: EncodedToken =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
        Ok(decoded.token)
    }
}

impl std::str::FromStr for PageToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.encode().map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use chrono::{TimeZone, Utc};

    fn sample_token() -> PageToken {
        PageToken::new()
            .with_filter(FilterField::in_list("status", ["A", "C"]))
            .with_filter(FilterField::greater_than("likes", 10i64))
            .with_sort(SortField::desc("createdAt"))
            .with_sort(SortField::asc("title"))
            .with_cursor(
                "createdAt",
                Utc.timestamp_opt(1_700_000_500, 42).unwrap(),
            )
            .with_cursor("title", "Zebra")
            .with_tie_breaker(ObjectId::new())
    }

    #[test]
    fn test_token_encode_decode() {
        let token = sample_token();
        let encoded = token.encode().unwrap();
        let decoded = PageToken::decode(&encoded).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_empty_token_round_trip() {
        let token = PageToken::new();
        assert_eq!(PageToken::decode(&token.encode().unwrap()).unwrap(), token);
        assert!(!token.has_position());
    }

    #[test]
    fn test_search_token_round_trip() {
        let token = PageToken::new()
            .with_filter(FilterField::equals("lang", "en"))
            .with_search_after("CMtJGgYQuq+ngwgaCSkAjBYH7AAAAA==");
        let decoded: PageToken = token.encode().unwrap().parse().unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_token_decode_invalid_base64() {
        let result = PageToken::decode("not-valid-base64!!!");
        assert!(matches!(result, Err(TokenError::Malformed { .. })));
    }

    #[test]
    fn test_token_decode_truncated() {
        let encoded = sample_token().encode().unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        assert!(PageToken::decode(truncated).is_err());
    }

    #[test]
    fn test_token_decode_unknown_version() {
        let encoded = URL_SAFE_NO_PAD.encode(br#"{"v":7}"#);
        assert_eq!(
            PageToken::decode(&encoded),
            Err(TokenError::UnsupportedVersion { version: 7 })
        );
    }

    #[test]
    fn test_token_decode_missing_version() {
        let encoded = URL_SAFE_NO_PAD.encode(br#"{"s":[]}"#);
        assert!(matches!(
            PageToken::decode(&encoded),
            Err(TokenError::Malformed { .. })
        ));
    }

    #[test]
    fn test_next_page_token_keeps_filters_and_sorts() {
        let token = sample_token().with_search_after("marker");
        let mut cursors = BTreeMap::new();
        cursors.insert("createdAt".to_string(), CursorValue::Int(5));
        let next = token.next_page_token(cursors.clone(), None);

        assert_eq!(next.filters, token.filters);
        assert_eq!(next.sort_fields, token.sort_fields);
        assert_eq!(next.cursors, cursors);
        assert!(next.tie_breaker.is_none());
        assert!(next.search_after.is_none());
    }

    #[test]
    fn test_sort_field_parse() {
        assert_eq!(SortField::parse("-createdAt"), SortField::desc("createdAt"));
        assert_eq!(SortField::parse("title"), SortField::asc("title"));
        assert_eq!(SortField::parse("+title"), SortField::asc("title"));
    }

    #[test]
    fn test_filter_value_as_list() {
        let single = FilterValue::from(CursorValue::from("A"));
        assert_eq!(single.as_list().len(), 1);
        assert!(single.as_single().is_some());

        let list = FilterValue::List(vec!["A".into(), "B".into()]);
        assert_eq!(list.as_list().len(), 2);
        assert!(list.as_single().is_none());
    }
}
