//! Field-query builder.

use std::collections::BTreeMap;

use bson::{Bson, Document, doc};

use crate::config::SeekStrategy;
use crate::entity::{EntityShape, FieldUsage};
use crate::error::{BackendError, PaginationResult, ValidationError, ValidationResult};
use crate::types::{CursorValue, FilterField, FilterOperator, PageToken, SortDirection};

use super::document::lookup;
use super::seek::{SeekKey, seek_predicate};

/// A keyset-paginated query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldQuery {
    /// Collection to read.
    pub collection: String,
    /// Filter document, including the seek predicate.
    pub filter: Document,
    /// Sort document, ending with the identity tie-breaker.
    pub sort: Document,
    /// Rows to fetch: the page size plus one look-ahead row.
    pub limit: i64,
}

impl FieldQuery {
    /// Number of items a page of this query returns.
    pub fn page_size(&self) -> usize {
        usize::try_from(self.limit.saturating_sub(1)).unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
struct SortKey {
    /// Logical field; `None` for the implicit identity key.
    field: Option<String>,
    path: String,
    direction: SortDirection,
}

/// Builds a [`FieldQuery`] from a page token and derives the token for the
/// page after it.
///
/// # Example
///
/// ```
/// use bson::doc;
/// use strata_pagination::entity::EntityShape;
/// use strata_pagination::query::FieldQueryBuilder;
/// use strata_pagination::types::{PageToken, SortField};
///
/// let shape = EntityShape::new("Post", "posts").with_attribute("createdAt");
/// let token = PageToken::new().with_sort(SortField::desc("createdAt"));
///
/// let query = FieldQueryBuilder::new(&shape, &token, 2).build().unwrap();
/// assert_eq!(query.sort, doc! { "createdAt": -1, "_id": 1 });
/// assert_eq!(query.limit, 3);
/// ```
#[derive(Debug, Clone)]
pub struct FieldQueryBuilder<'a> {
    shape: &'a EntityShape,
    token: &'a PageToken,
    limit: u32,
    strategy: SeekStrategy,
}

impl<'a> FieldQueryBuilder<'a> {
    /// Creates a builder for a page of `limit` items.
    pub fn new(shape: &'a EntityShape, token: &'a PageToken, limit: u32) -> Self {
        Self {
            shape,
            token,
            limit,
            strategy: SeekStrategy::default(),
        }
    }

    /// Sets the seek strategy.
    pub fn with_strategy(mut self, strategy: SeekStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Validates the token and builds the query.
    pub fn build(&self) -> PaginationResult<FieldQuery> {
        if self.limit == 0 {
            return Err(ValidationError::InvalidLimit {
                limit: self.limit.to_string(),
            }
            .into());
        }

        self.shape.validate_token(self.token)?;

        let keys = self.sort_keys()?;

        let mut sort = Document::new();
        for key in &keys {
            sort.insert(key.path.clone(), key.direction.as_i32());
        }

        let mut clauses = Vec::with_capacity(self.token.filters.len() + 1);
        for filter in &self.token.filters {
            clauses.push(self.filter_clause(filter)?);
        }
        if let Some(seek) = seek_predicate(&self.seek_keys(&keys), self.strategy) {
            clauses.push(seek);
        }

        let filter = match clauses.len() {
            0 => Document::new(),
            1 => clauses.remove(0),
            _ => doc! { "$and": clauses },
        };

        Ok(FieldQuery {
            collection: self.shape.collection().to_string(),
            filter,
            sort,
            limit: i64::from(self.limit) + 1,
        })
    }

    /// Splits fetched rows into the page and the next page token.
    ///
    /// `rows` is the result of the query from [`build`](Self::build): if it
    /// holds the look-ahead row, the page is truncated and the token is
    /// derived from the last row kept.
    pub fn paginate(
        &self,
        mut rows: Vec<Document>,
    ) -> PaginationResult<(Vec<Document>, Option<PageToken>)> {
        let page_size = self.limit as usize;
        if rows.len() <= page_size {
            return Ok((rows, None));
        }

        rows.truncate(page_size);
        let next = match rows.last() {
            Some(last) => Some(self.next_token(last)?),
            None => None,
        };
        Ok((rows, next))
    }

    /// Derives the token positioned after `row`.
    pub fn next_token(&self, row: &Document) -> PaginationResult<PageToken> {
        let mut cursors = BTreeMap::new();
        let mut tie_breaker = None;

        for key in self.sort_keys()? {
            let value = cursor_at(row, &key.path)?;
            match key.field {
                Some(field) => {
                    cursors.insert(field, value);
                }
                None => tie_breaker = Some(value),
            }
        }

        Ok(self.token.next_page_token(cursors, tie_breaker))
    }

    /// Sort keys in declared order, plus the identity unless already sorted.
    fn sort_keys(&self) -> ValidationResult<Vec<SortKey>> {
        let mut keys = Vec::with_capacity(self.token.sort_fields.len() + 1);

        for sort in &self.token.sort_fields {
            let path = self.shape.storage_path(&sort.field, FieldUsage::Sorting)?;
            keys.push(SortKey {
                field: Some(sort.field.clone()),
                path: path.to_string(),
                direction: sort.direction,
            });
        }

        let id_path = self.shape.id_path();
        if !keys.iter().any(|k| k.path == id_path) {
            keys.push(SortKey {
                field: None,
                path: id_path.to_string(),
                direction: SortDirection::Ascending,
            });
        }

        Ok(keys)
    }

    /// The longest prefix of sort keys that carries a resume value.
    fn seek_keys(&self, keys: &[SortKey]) -> Vec<SeekKey> {
        keys.iter()
            .map_while(|key| {
                let value = match &key.field {
                    Some(field) => self.token.cursor(field),
                    None => self.token.tie_breaker.as_ref(),
                }?;
                Some(SeekKey {
                    path: key.path.clone(),
                    direction: key.direction,
                    value: value.to_bson(),
                    tie_breaker: key.field.is_none(),
                })
            })
            .collect()
    }

    fn filter_clause(&self, filter: &FilterField) -> ValidationResult<Document> {
        let path = self.shape.storage_path(&filter.field, FieldUsage::Filtering)?;

        let condition = match filter.operator {
            FilterOperator::In => {
                let values: Vec<Bson> = filter
                    .value
                    .as_list()
                    .into_iter()
                    .map(CursorValue::to_bson)
                    .collect();
                doc! { "$in": values }
            }
            operator => {
                let value = filter.value.as_single().ok_or_else(|| {
                    ValidationError::InvalidOperand {
                        field: filter.field.clone(),
                        operator: operator.to_string(),
                        message: "operator requires a single value".to_string(),
                    }
                })?;
                let op = match operator {
                    FilterOperator::LessThan => "$lt",
                    FilterOperator::GreaterThan => "$gt",
                    _ => "$eq",
                };
                doc! { op: value.to_bson() }
            }
        };

        Ok(doc! { path: condition })
    }
}

/// The resume value at `path`; a missing field resumes as null, which is
/// where the database sorts it.
fn cursor_at(row: &Document, path: &str) -> PaginationResult<CursorValue> {
    let Some(value) = lookup(row, path) else {
        return Ok(CursorValue::Null);
    };

    CursorValue::try_from(value).map_err(|e| {
        BackendError::SerializationError {
            message: format!("cannot resume after '{}': {}", path, e),
        }
        .into()
    })
}
