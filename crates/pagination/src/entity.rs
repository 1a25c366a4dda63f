//! Entity declarations: which fields a list endpoint may sort, filter and
//! resume on, and where those fields live in storage.
//!
//! Every entity is declared once, statically, by the service that owns it.
//! A declaration lists the entity's plain attributes (stored under their own
//! name), an explicit mapping table for logical names that live elsewhere
//! (`author` → `author.id`), and the fields that must never reach a query.
//! Client-supplied field names are checked against this table before any
//! query is built.
//!
//! ```
//! use strata_pagination::entity::{EntityShape, FieldUsage};
//!
//! let shape = EntityShape::new("Post", "posts")
//!     .with_attributes(["title", "status", "createdAt"])
//!     .with_mapping("author", "author.id")
//!     .with_attribute("draftNotes")
//!     .with_excluded("draftNotes");
//!
//! shape.validate().unwrap();
//! assert_eq!(shape.storage_path("author", FieldUsage::Sorting).unwrap(), "author.id");
//! assert!(shape.storage_path("draftNotes", FieldUsage::Filtering).is_err());
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;

use crate::error::{ValidationError, ValidationResult};
use crate::types::{FilterField, FilterOperator, FilterValue, PageToken};

pub use crate::error::FieldUsage;

/// Default storage path of the document identity.
pub const DEFAULT_ID_PATH: &str = "_id";

/// Mapping from logical field names to storage paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMappings {
    entries: BTreeMap<String, String>,
}

impl FieldMappings {
    /// Creates an empty mapping table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping.
    pub fn with(mut self, field: impl Into<String>, path: impl Into<String>) -> Self {
        self.entries.insert(field.into(), path.into());
        self
    }

    /// Returns the storage path for a logical field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries.get(field).map(String::as_str)
    }

    /// Returns true if the field is mapped.
    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Iterates over `(field, path)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no mappings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMappings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Fields that must not be used for sorting, filtering or cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedFields {
    fields: BTreeSet<String>,
}

impl ExcludedFields {
    /// Creates an empty exclusion set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an excluded field.
    pub fn with(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into());
        self
    }

    /// Returns true if the field is excluded.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Iterates over the excluded fields.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ExcludedFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The static description of a paginated entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityShape {
    name: String,
    collection: String,
    attributes: BTreeSet<String>,
    mappings: FieldMappings,
    excluded: ExcludedFields,
    id_path: String,
}

impl EntityShape {
    /// Creates a shape for an entity stored in `collection`.
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            attributes: BTreeSet::new(),
            mappings: FieldMappings::default(),
            excluded: ExcludedFields::default(),
            id_path: DEFAULT_ID_PATH.to_string(),
        }
    }

    /// Declares an attribute stored under its own name.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.insert(attribute.into());
        self
    }

    /// Declares several attributes stored under their own names.
    pub fn with_attributes<S, I>(mut self, attributes: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        self.attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Maps a logical field name to a storage path.
    pub fn with_mapping(mut self, field: impl Into<String>, path: impl Into<String>) -> Self {
        self.mappings = self.mappings.with(field, path);
        self
    }

    /// Replaces the mapping table.
    pub fn with_mappings(mut self, mappings: FieldMappings) -> Self {
        self.mappings = mappings;
        self
    }

    /// Excludes a field from sorting, filtering and cursors.
    pub fn with_excluded(mut self, field: impl Into<String>) -> Self {
        self.excluded = self.excluded.with(field);
        self
    }

    /// Replaces the exclusion set.
    pub fn with_excluded_fields(mut self, excluded: ExcludedFields) -> Self {
        self.excluded = excluded;
        self
    }

    /// Sets the storage path of the document identity (default `_id`).
    pub fn with_id_path(mut self, path: impl Into<String>) -> Self {
        self.id_path = path.into();
        self
    }

    /// Returns the entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the field mappings.
    pub fn mappings(&self) -> &FieldMappings {
        &self.mappings
    }

    /// Returns the excluded fields.
    pub fn excluded(&self) -> &ExcludedFields {
        &self.excluded
    }

    /// Returns the storage path of the document identity.
    pub fn id_path(&self) -> &str {
        &self.id_path
    }

    /// Returns true if the field is mapped or declared.
    pub fn is_known(&self, field: &str) -> bool {
        self.mappings.contains(field) || self.attributes.contains(field)
    }

    /// Resolves a client-supplied field to its storage path.
    pub fn storage_path(&self, field: &str, usage: FieldUsage) -> ValidationResult<&str> {
        let path = match self.mappings.get(field) {
            Some(path) => path,
            None => match self.attributes.get(field) {
                Some(attribute) => attribute.as_str(),
                None => {
                    return Err(ValidationError::UnknownField {
                        field: field.to_string(),
                        entity: self.name.clone(),
                        usage,
                    });
                }
            },
        };

        if self.excluded.contains(field) {
            return Err(ValidationError::ExcludedField {
                field: field.to_string(),
                entity: self.name.clone(),
                usage,
            });
        }

        Ok(path)
    }

    /// Checks every field a page token references.
    ///
    /// Runs before any query is built, so a rejected token never reaches
    /// the database.
    pub fn validate_token(&self, token: &PageToken) -> ValidationResult<()> {
        for filter in &token.filters {
            self.storage_path(&filter.field, FieldUsage::Filtering)?;
            validate_operand(filter)?;
        }

        for sort in &token.sort_fields {
            self.storage_path(&sort.field, FieldUsage::Sorting)?;
        }

        for field in token.cursors.keys() {
            self.storage_path(field, FieldUsage::CursorPagination)?;
            if !token.sort_fields.iter().any(|s| &s.field == field) {
                return Err(ValidationError::CursorWithoutSort {
                    field: field.clone(),
                    entity: self.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Checks the declaration itself. Call once at startup.
    pub fn validate(&self) -> ValidationResult<()> {
        let invalid = |message: String| ValidationError::InvalidEntity {
            entity: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("entity name is empty".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(invalid("collection name is empty".to_string()));
        }
        if !is_safe_path(&self.id_path) {
            return Err(invalid(format!("invalid id path '{}'", self.id_path)));
        }

        for attribute in &self.attributes {
            if !is_safe_path(attribute) {
                return Err(invalid(format!("invalid attribute '{}'", attribute)));
            }
        }

        for (field, path) in self.mappings.iter() {
            if field.trim().is_empty() {
                return Err(invalid("mapping with empty field name".to_string()));
            }
            if !is_safe_path(path) {
                return Err(invalid(format!(
                    "invalid storage path '{}' for '{}'",
                    path, field
                )));
            }
        }

        for field in self.excluded.iter() {
            if !self.is_known(field) {
                return Err(invalid(format!(
                    "excluded field '{}' is not declared",
                    field
                )));
            }
        }

        Ok(())
    }
}

/// A type whose list endpoints are paginated through this crate.
///
/// Implementors return their static declaration; the paginator deserializes
/// result rows into `Self`.
pub trait PagedEntity: DeserializeOwned + Send {
    /// The entity's field declaration.
    fn entity_shape() -> EntityShape;
}

/// Storage paths are dotted field names: no operators, no empty segments.
fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('.')
            .all(|segment| !segment.is_empty() && !segment.starts_with('$') && !segment.contains('\0'))
}

fn validate_operand(filter: &FilterField) -> ValidationResult<()> {
    let invalid = |message: &str| ValidationError::InvalidOperand {
        field: filter.field.clone(),
        operator: filter.operator.to_string(),
        message: message.to_string(),
    };

    if filter.value.as_list().iter().any(|v| v.is_null()) {
        return Err(invalid("null is not a filter operand"));
    }

    match (filter.operator, &filter.value) {
        (FilterOperator::In, FilterValue::List(values)) if values.is_empty() => {
            Err(invalid("operand list is empty"))
        }
        (FilterOperator::In, _) => Ok(()),
        (_, FilterValue::List(_)) => Err(invalid("operator requires a single value")),
        (FilterOperator::LessThan | FilterOperator::GreaterThan, FilterValue::Single(value))
            if value.type_tag() == crate::types::CursorType::Id =>
        {
            Err(invalid("identifiers cannot be range-compared"))
        }
        _ => Ok(()),
    }
}
