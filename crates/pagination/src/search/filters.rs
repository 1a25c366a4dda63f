//! Token filters rendered as search `filter` clauses.

use bson::{Document, doc};

use crate::entity::{EntityShape, FieldUsage};
use crate::error::{PaginationResult, ValidationError};
use crate::types::{CursorValue, FilterField, FilterOperator};

/// Renders one filter as a search operator.
///
/// Numeric and date equality become a closed `range`, string equality a
/// keyword `text` match, identifier equality an `equals`; `IN` becomes a
/// `queryString` of OR-joined quoted terms.
pub fn filter_clause(shape: &EntityShape, filter: &FilterField) -> PaginationResult<Document> {
    let path = shape.storage_path(&filter.field, FieldUsage::Filtering)?;

    let clause = match filter.operator {
        FilterOperator::In => {
            let query = filter
                .value
                .as_list()
                .into_iter()
                .map(|v| format!("\"{}\"", escape_term(&v.to_term())))
                .collect::<Vec<_>>()
                .join(" OR ");
            doc! { "queryString": { "defaultPath": path, "query": query } }
        }
        operator => {
            let value = filter
                .value
                .as_single()
                .ok_or_else(|| ValidationError::InvalidOperand {
                    field: filter.field.clone(),
                    operator: operator.to_string(),
                    message: "operator requires a single value".to_string(),
                })?;

            match (operator, value) {
                (FilterOperator::Equals, CursorValue::String(s)) => {
                    doc! { "text": { "query": s.as_str(), "path": path } }
                }
                (FilterOperator::Equals, CursorValue::Id(id)) => {
                    doc! { "equals": { "path": path, "value": *id } }
                }
                (FilterOperator::Equals, v) => doc! {
                    "range": { "path": path, "gte": v.to_bson(), "lte": v.to_bson() }
                },
                (FilterOperator::LessThan, v) => doc! {
                    "range": { "path": path, "lt": v.to_bson() }
                },
                (_, v) => doc! {
                    "range": { "path": path, "gt": v.to_bson() }
                },
            }
        }
    };

    Ok(clause)
}

/// Escapes a term for use inside a quoted query-string phrase.
fn escape_term(term: &str) -> String {
    term.replace('\\', "\\\\").replace('"', "\\\"")
}
