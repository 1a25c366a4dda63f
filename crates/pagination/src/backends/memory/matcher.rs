//! Filter evaluation and ordering over in-memory documents.
//!
//! Supports the subset of the query language the field-query builder emits:
//! implicit equality, `$eq`, `$ne`, `$in`, `$lt`, `$gt`, `$gte`, `$and`, `$or`.
//! Equality with null also matches a missing field. Range operators never
//! match NaN.

use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::error::BackendError;
use crate::query::document::{lookup, lookup_all};

/// Returns true if `document` satisfies `filter`.
pub fn matches(document: &Document, filter: &Document) -> Result<bool, BackendError> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => all_of(document, condition)?,
            "$or" => any_of(document, condition)?,
            op if op.starts_with('$') => return Err(unsupported(op)),
            path => field_matches(document, path, condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Orders two documents by a sort specification (`{path: 1 | -1}`).
///
/// Missing fields sort as null, before every other value.
pub fn compare_by(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (path, direction) in sort {
        let left = lookup(a, path).unwrap_or(&Bson::Null);
        let right = lookup(b, path).unwrap_or(&Bson::Null);
        let ordering = compare(left, right);
        let ordering = match direction {
            Bson::Int32(d) if *d < 0 => ordering.reverse(),
            Bson::Int64(d) if *d < 0 => ordering.reverse(),
            _ => ordering,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over BSON values: type bracket first, then value.
pub fn compare(a: &Bson, b: &Bson) -> Ordering {
    match type_rank(a).cmp(&type_rank(b)) {
        Ordering::Equal => {}
        other => return other,
    }

    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => i64::from(*x).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&i64::from(*y)),
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => compare_numbers(x, y),
            _ => Ordering::Equal,
        },
    }
}

/// NaN equals NaN and sorts below every other number.
fn compare_numbers(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

fn is_nan(value: &Bson) -> bool {
    matches!(value, Bson::Double(n) if n.is_nan())
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn all_of(document: &Document, clauses: &Bson) -> Result<bool, BackendError> {
    for clause in clause_list(clauses, "$and")? {
        if !matches(document, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_of(document: &Document, clauses: &Bson) -> Result<bool, BackendError> {
    for clause in clause_list(clauses, "$or")? {
        if matches(document, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn clause_list<'a>(value: &'a Bson, op: &str) -> Result<Vec<&'a Document>, BackendError> {
    let Bson::Array(items) = value else {
        return Err(BackendError::QueryError {
            message: format!("{} requires an array", op),
        });
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => Ok(d),
            _ => Err(BackendError::QueryError {
                message: format!("{} entries must be documents", op),
            }),
        })
        .collect()
}

fn field_matches(document: &Document, path: &str, condition: &Bson) -> Result<bool, BackendError> {
    let values = lookup_all(document, path);

    let operators = match condition {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => d,
        literal => return Ok(any_equal(&values, literal)),
    };

    for (op, operand) in operators {
        let ok = match op.as_str() {
            "$eq" => any_equal(&values, operand),
            "$ne" => !any_equal(&values, operand),
            "$in" => {
                let Bson::Array(candidates) = operand else {
                    return Err(BackendError::QueryError {
                        message: "$in requires an array".to_string(),
                    });
                };
                candidates.iter().any(|c| any_equal(&values, c))
            }
            "$lt" => any_in_range(&values, operand, |o| o == Ordering::Less),
            "$gt" => any_in_range(&values, operand, |o| o == Ordering::Greater),
            "$gte" => any_in_range(&values, operand, |o| o != Ordering::Less),
            other => return Err(unsupported(other)),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality over every value at a path; null also matches an absent path.
fn any_equal(values: &[&Bson], operand: &Bson) -> bool {
    if matches!(operand, Bson::Null) && values.is_empty() {
        return true;
    }
    values.iter().any(|v| equals(v, operand))
}

fn any_in_range(values: &[&Bson], operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    if is_nan(operand) {
        return false;
    }
    values
        .iter()
        .any(|v| comparable(v, operand) && !is_nan(v) && accept(compare(v, operand)))
}

fn equals(value: &Bson, operand: &Bson) -> bool {
    comparable(value, operand) && compare(value, operand) == Ordering::Equal
}

/// Range and equality predicates only match values in the same type bracket.
fn comparable(value: &Bson, operand: &Bson) -> bool {
    type_rank(value) == type_rank(operand)
}

fn unsupported(op: &str) -> BackendError {
    BackendError::UnsupportedCapability {
        backend_name: "memory".to_string(),
        capability: format!("query operator {}", op),
    }
}
