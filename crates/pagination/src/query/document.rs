//! Dotted-path access into BSON documents.

use bson::{Bson, Document};

/// Returns the value at a dotted path, descending through embedded documents.
///
/// Arrays are not traversed: a path that crosses an array yields `None`.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;

    for segment in segments {
        match current {
            Bson::Document(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }

    Some(current)
}

/// Returns every value reachable at a dotted path.
///
/// Arrays fan out: each element is followed separately, and a terminal
/// array contributes both its elements and itself. This matches how the
/// database matches query predicates against array fields.
pub fn lookup_all<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some(value) = document.get(segments[0]) {
        collect(value, &segments[1..], &mut out);
    }
    out
}

fn collect<'a>(value: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
    match (rest.split_first(), value) {
        (None, Bson::Array(items)) => {
            out.extend(items.iter());
            out.push(value);
        }
        (None, _) => out.push(value),
        (Some((segment, tail)), Bson::Document(inner)) => {
            if let Some(next) = inner.get(*segment) {
                collect(next, tail, out);
            }
        }
        (Some(_), Bson::Array(items)) => {
            for item in items {
                collect(item, rest, out);
            }
        }
        (Some(_), _) => {}
    }
}
