//! Search scoring configuration and index definitions.

use std::collections::BTreeMap;
use std::fmt;

use bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityShape, FieldUsage};
use crate::error::{SearchError, SearchResult};

use super::near::NearField;
use super::score::Score;

/// Resolves a logical field referenced by search configuration.
pub(crate) fn resolve_path(shape: &EntityShape, field: &str) -> SearchResult<String> {
    shape
        .storage_path(field, FieldUsage::SearchScoring)
        .map(str::to_string)
        .map_err(|e| SearchError::InvalidConfiguration {
            message: e.to_string(),
        })
}

/// A text clause that raises the score of documents matching in `field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBoost {
    /// Logical field matched against the search text.
    pub field: String,
    /// Score applied when the field matches.
    pub score: Score,
}

/// Declarative relevance configuration for a search-backed list.
///
/// # Example
///
/// ```
/// use strata_pagination::entity::EntityShape;
/// use strata_pagination::search::{Score, SearchConfiguration};
///
/// let shape = EntityShape::new("Post", "posts").with_attributes(["title", "body"]);
/// let config = SearchConfiguration::new(["title", "body"])
///     .with_max_edits(1)
///     .with_boost("title", Score::boost(3.0));
///
/// assert!(config.validate(&shape).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfiguration {
    /// Fields the search text must match in (fuzzily).
    pub text_fields: Vec<String>,

    /// Fuzzy edit distance, 1 or 2. Falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_edits: Option<u8>,

    /// Optional boosting text clauses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub score_boosts: Vec<ScoreBoost>,

    /// Optional proximity clauses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub near_fields: Vec<NearField>,
}

impl SearchConfiguration {
    /// Creates a configuration matching in `text_fields`.
    pub fn new<S, I>(text_fields: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        Self {
            text_fields: text_fields.into_iter().map(Into::into).collect(),
            max_edits: None,
            score_boosts: Vec::new(),
            near_fields: Vec::new(),
        }
    }

    /// Sets the fuzzy edit distance.
    pub fn with_max_edits(mut self, max_edits: u8) -> Self {
        self.max_edits = Some(max_edits);
        self
    }

    /// Adds a boosting clause.
    pub fn with_boost(mut self, field: impl Into<String>, score: Score) -> Self {
        self.score_boosts.push(ScoreBoost {
            field: field.into(),
            score,
        });
        self
    }

    /// Adds a proximity clause.
    pub fn with_near(mut self, near: NearField) -> Self {
        self.near_fields.push(near);
        self
    }

    /// Checks the configuration against an entity.
    pub fn validate(&self, shape: &EntityShape) -> SearchResult<()> {
        if self.text_fields.is_empty() {
            return Err(SearchError::InvalidConfiguration {
                message: "at least one text field is required".to_string(),
            });
        }

        if let Some(edits) = self.max_edits
            && !(1..=2).contains(&edits)
        {
            return Err(SearchError::InvalidConfiguration {
                message: format!("maxEdits must be 1 or 2, got {}", edits),
            });
        }

        for field in &self.text_fields {
            resolve_path(shape, field)?;
        }

        for boost in &self.score_boosts {
            resolve_path(shape, &boost.field)?;
            boost.score.validate(shape)?;
        }

        for near in &self.near_fields {
            near.validate(shape)?;
        }

        Ok(())
    }

    /// Checks that every field this configuration reads is indexed with a
    /// compatible type.
    ///
    /// Dynamic indexes accept any field and always pass.
    pub fn check_index(
        &self,
        shape: &EntityShape,
        index: &SearchIndexDefinition,
    ) -> SearchResult<()> {
        if index.dynamic {
            return Ok(());
        }

        let mut missing = Vec::new();
        let mut require = |field: &str, kinds: &[IndexedFieldKind]| -> SearchResult<()> {
            let path = resolve_path(shape, field)?;
            if !index.has_field(&path, kinds) {
                missing.push(format!("{} ({})", path, kinds[0]));
            }
            Ok(())
        };

        let text_kinds = [IndexedFieldKind::String, IndexedFieldKind::Autocomplete];

        for field in &self.text_fields {
            require(field, &text_kinds)?;
        }

        for boost in &self.score_boosts {
            require(&boost.field, &text_kinds)?;
            for field in boost.score.referenced_fields() {
                require(field, &[IndexedFieldKind::Number])?;
            }
        }

        for near in &self.near_fields {
            let kind = match near {
                NearField::Date { .. } => IndexedFieldKind::Date,
                NearField::Numeric { .. } => IndexedFieldKind::Number,
                NearField::Geo { .. } => IndexedFieldKind::Geo,
            };
            require(near.field(), &[kind])?;
            if let Some(score) = near.score() {
                for field in score.referenced_fields() {
                    require(field, &[IndexedFieldKind::Number])?;
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SearchError::InvalidConfiguration {
                message: format!(
                    "index '{}' does not cover: {}",
                    index.name,
                    missing.join(", ")
                ),
            })
        }
    }
}

/// Atlas Search field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexedFieldKind {
    /// Analyzed text.
    String,
    /// Edge-gram text for type-ahead.
    Autocomplete,
    /// Exact-match keyword.
    Token,
    /// Integer or double.
    Number,
    /// Date.
    Date,
    /// GeoJSON point.
    Geo,
    /// Object identifier.
    ObjectId,
    /// Boolean.
    Boolean,
}

impl fmt::Display for IndexedFieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexedFieldKind::String => "string",
            IndexedFieldKind::Autocomplete => "autocomplete",
            IndexedFieldKind::Token => "token",
            IndexedFieldKind::Number => "number",
            IndexedFieldKind::Date => "date",
            IndexedFieldKind::Geo => "geo",
            IndexedFieldKind::ObjectId => "objectId",
            IndexedFieldKind::Boolean => "boolean",
        };
        write!(f, "{}", name)
    }
}

/// One indexed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedField {
    /// Storage path.
    pub path: String,
    /// Field type.
    pub kind: IndexedFieldKind,
    /// Analyzer for string fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
}

impl IndexedField {
    /// Creates an indexed field without an analyzer.
    pub fn new(path: impl Into<String>, kind: IndexedFieldKind) -> Self {
        Self {
            path: path.into(),
            kind,
            analyzer: None,
        }
    }

    /// Creates an analyzed string field.
    pub fn text(path: impl Into<String>, analyzer: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: IndexedFieldKind::String,
            analyzer: Some(analyzer.into()),
        }
    }
}

/// A search index as a flat list of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIndexDefinition {
    /// Index name.
    pub name: String,
    /// Whether every field is indexed automatically.
    #[serde(default)]
    pub dynamic: bool,
    /// Explicitly indexed fields.
    #[serde(default)]
    pub fields: Vec<IndexedField>,
}

impl SearchIndexDefinition {
    /// Returns true if `path` is indexed as one of `kinds`.
    pub fn has_field(&self, path: &str, kinds: &[IndexedFieldKind]) -> bool {
        self.fields
            .iter()
            .any(|f| f.path == path && kinds.contains(&f.kind))
    }

    /// Renders the Atlas `mappings` definition.
    ///
    /// Dotted paths become nested `document` fields. A path indexed with
    /// several kinds renders as an array of type definitions.
    pub fn to_document(&self) -> Document {
        let mut tree = MappingNode::default();
        for field in &self.fields {
            tree.insert(&field.path, field);
        }
        doc! {
            "mappings": {
                "dynamic": self.dynamic,
                "fields": tree.render_fields(),
            }
        }
    }
}

#[derive(Default)]
struct MappingNode {
    types: Vec<Document>,
    children: BTreeMap<String, MappingNode>,
}

impl MappingNode {
    fn insert(&mut self, path: &str, field: &IndexedField) {
        let node = path.split('.').fold(self, |node, segment| {
            node.children.entry(segment.to_string()).or_default()
        });

        let mut definition = doc! { "type": field.kind.to_string() };
        if let Some(analyzer) = &field.analyzer {
            definition.insert("analyzer", analyzer.clone());
        }
        node.types.push(definition);
    }

    fn render_fields(&self) -> Document {
        let mut fields = Document::new();
        for (name, child) in &self.children {
            fields.insert(name.clone(), child.render());
        }
        fields
    }

    fn render(&self) -> bson::Bson {
        let mut types = self.types.clone();
        if !self.children.is_empty() {
            types.push(doc! { "type": "document", "fields": self.render_fields() });
        }
        match types.len() {
            1 => bson::Bson::Document(types.remove(0)),
            _ => bson::Bson::Array(types.into_iter().map(bson::Bson::Document).collect()),
        }
    }
}
