//! Keyset seek predicates.
//!
//! Given the sort keys of a query and the values of the last row already
//! returned, builds the predicate selecting rows strictly after that row.
//!
//! The database orders null and missing values before every number, and NaN
//! before every other number. Range operators never match either, so a key
//! whose successors include them gets explicit equality branches.

use bson::{Bson, Document, doc};

use crate::config::SeekStrategy;
use crate::types::SortDirection;

/// One sort key with its resume value.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekKey {
    /// Storage path.
    pub path: String,
    /// Sort direction.
    pub direction: SortDirection,
    /// Value of the last returned row; `Null` when the row had none.
    pub value: Bson,
    /// True for the implicit identity tie-breaker.
    pub tie_breaker: bool,
}

/// Builds the seek predicate for `keys`, primary key first.
///
/// Returns `None` when there is nothing to seek past.
pub fn seek_predicate(keys: &[SeekKey], strategy: SeekStrategy) -> Option<Document> {
    match strategy {
        SeekStrategy::Lexicographic => lexicographic(keys),
        SeekStrategy::PerFieldOr => per_field_or(keys),
    }
}

/// `(k1 ⋗ v1) OR (k1 = v1 AND k2 ⋗ v2) OR ...`
fn lexicographic(keys: &[SeekKey]) -> Option<Document> {
    let mut branches: Vec<Document> = Vec::with_capacity(keys.len());

    for (i, key) in keys.iter().enumerate() {
        // Nothing sorts after null in descending order.
        let Some(after) = strictly_after(key) else {
            continue;
        };
        let mut branch = Document::new();
        for prefix in &keys[..i] {
            branch.insert(prefix.path.clone(), prefix.value.clone());
        }
        for (path, condition) in after {
            branch.insert(path, condition);
        }
        branches.push(branch);
    }

    any_of(branches)
}

/// `(k1 ⋗ v1) OR (k2 ⋗ v2) OR ...` over the client sort fields only.
///
/// Rows tying on the primary field are not handled; the tie-breaker is only
/// used when no client sort field carries a value.
fn per_field_or(keys: &[SeekKey]) -> Option<Document> {
    let sorted: Vec<&SeekKey> = keys.iter().filter(|k| !k.tie_breaker).collect();
    let branches: Vec<Document> = if sorted.is_empty() {
        keys.iter().filter_map(strictly_after).collect()
    } else {
        sorted.into_iter().filter_map(strictly_after).collect()
    };

    any_of(branches)
}

/// Condition on one key selecting the values that sort after its resume value.
fn strictly_after(key: &SeekKey) -> Option<Document> {
    let path = key.path.clone();
    let value = &key.value;

    match key.direction {
        SortDirection::Ascending => match value {
            Bson::Null => Some(doc! { path: { "$ne": Bson::Null } }),
            Bson::Double(n) if n.is_nan() => {
                Some(doc! { path: { "$gte": f64::NEG_INFINITY } })
            }
            _ => Some(doc! { path: { "$gt": value.clone() } }),
        },
        SortDirection::Descending => match value {
            Bson::Null => None,
            Bson::Double(n) if n.is_nan() => Some(doc! { path: Bson::Null }),
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Some(doc! {
                "$or": [
                    { path.clone(): { "$lt": value.clone() } },
                    { path.clone(): f64::NAN },
                    { path: Bson::Null },
                ]
            }),
            _ => Some(doc! {
                "$or": [
                    { path.clone(): { "$lt": value.clone() } },
                    { path: Bson::Null },
                ]
            }),
        },
    }
}

fn any_of(mut branches: Vec<Document>) -> Option<Document> {
    match branches.len() {
        0 => None,
        1 => branches.pop(),
        _ => Some(doc! { "$or": branches }),
    }
}
