//! Search aggregation pipeline builder.

use bson::{Bson, Document, doc};

use crate::config::SearchSettings;
use crate::entity::{EntityShape, FieldUsage};
use crate::error::{PaginationResult, SearchError, ValidationError};
use crate::types::PageToken;

use super::config::{SearchConfiguration, resolve_path};
use super::filters::filter_clause;

/// A search aggregation ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPipeline {
    /// Collection to aggregate.
    pub collection: String,
    /// `$search`, `$addFields` and `$limit` stages.
    pub stages: Vec<Document>,
    /// Number of items a page returns; `$limit` is one more.
    pub page_size: usize,
}

/// Builds the `$search` pipeline for one page of a search-backed list.
///
/// # Example
///
/// ```
/// use bson::doc;
/// use strata_pagination::config::SearchSettings;
/// use strata_pagination::entity::EntityShape;
/// use strata_pagination::search::SearchPipelineBuilder;
/// use strata_pagination::types::PageToken;
///
/// let shape = EntityShape::new("Post", "posts");
/// let token = PageToken::new();
/// let settings = SearchSettings::default();
///
/// let pipeline = SearchPipelineBuilder::new(&shape, "posts_search", &token, "rust", 50, &settings)
///     .build()
///     .unwrap();
///
/// assert_eq!(pipeline.page_size, 10);
/// assert_eq!(pipeline.stages[2], doc! { "$limit": 11i64 });
/// ```
#[derive(Debug, Clone)]
pub struct SearchPipelineBuilder<'a> {
    shape: &'a EntityShape,
    index: &'a str,
    token: &'a PageToken,
    text: &'a str,
    limit: u32,
    configuration: Option<&'a SearchConfiguration>,
    settings: &'a SearchSettings,
}

impl<'a> SearchPipelineBuilder<'a> {
    /// Creates a builder without a scoring configuration.
    pub fn new(
        shape: &'a EntityShape,
        index: &'a str,
        token: &'a PageToken,
        text: &'a str,
        limit: u32,
        settings: &'a SearchSettings,
    ) -> Self {
        Self {
            shape,
            index,
            token,
            text,
            limit,
            configuration: None,
            settings,
        }
    }

    /// Sets the scoring configuration.
    pub fn with_configuration(mut self, configuration: Option<&'a SearchConfiguration>) -> Self {
        self.configuration = configuration;
        self
    }

    /// Page size after applying the engine cap.
    pub fn page_size(&self) -> usize {
        self.limit.min(self.settings.max_page_size) as usize
    }

    /// Validates inputs and builds the pipeline.
    pub fn build(&self) -> PaginationResult<SearchPipeline> {
        if self.limit == 0 {
            return Err(ValidationError::InvalidLimit {
                limit: self.limit.to_string(),
            }
            .into());
        }
        if self.text.trim().is_empty() {
            return Err(SearchError::EmptyQuery.into());
        }
        if self.index.trim().is_empty() {
            return Err(SearchError::InvalidConfiguration {
                message: "search index name is empty".to_string(),
            }
            .into());
        }

        self.shape.validate_token(self.token)?;
        if let Some(configuration) = self.configuration {
            configuration.validate(self.shape)?;
        }

        let page_size = self.page_size();
        let stages = vec![
            doc! { "$search": self.search_stage()? },
            self.metadata_stage(),
            doc! { "$limit": page_size as i64 + 1 },
        ];

        Ok(SearchPipeline {
            collection: self.shape.collection().to_string(),
            stages,
            page_size,
        })
    }

    /// Splits fetched rows into the page and the next page token.
    ///
    /// The token carries the continuation marker of the last row kept.
    pub fn paginate(
        &self,
        mut rows: Vec<Document>,
    ) -> PaginationResult<(Vec<Document>, Option<PageToken>)> {
        let page_size = self.page_size();
        if rows.len() <= page_size {
            return Ok((rows, None));
        }

        rows.truncate(page_size);
        let marker = rows
            .last()
            .and_then(|row| row.get_str(&self.settings.token_field).ok())
            .map(str::to_string)
            .ok_or_else(|| SearchError::MissingContinuation {
                field: self.settings.token_field.clone(),
            })?;

        Ok((rows, Some(self.token.next_search_token(marker))))
    }

    /// Removes the metadata fields from a row and returns its score.
    pub fn take_score(&self, row: &mut Document) -> f64 {
        row.remove(&self.settings.token_field);
        match row.remove(&self.settings.score_field) {
            Some(Bson::Double(score)) => score,
            Some(Bson::Int32(score)) => f64::from(score),
            Some(Bson::Int64(score)) => score as f64,
            _ => 0.0,
        }
    }

    fn search_stage(&self) -> PaginationResult<Document> {
        let mut stage = doc! { "index": self.index };

        let filters = self
            .token
            .filters
            .iter()
            .map(|f| filter_clause(self.shape, f).map(Bson::Document))
            .collect::<PaginationResult<Vec<Bson>>>()?;

        match self.configuration {
            None if filters.is_empty() => {
                stage.insert("text", self.wildcard_text());
            }
            None => {
                stage.insert(
                    "compound",
                    doc! {
                        "must": [ { "text": self.wildcard_text() } ],
                        "filter": filters,
                    },
                );
            }
            Some(configuration) => {
                stage.insert("compound", self.compound(configuration, filters)?);
            }
        }

        if !self.token.sort_fields.is_empty() {
            let mut sort = Document::new();
            for field in &self.token.sort_fields {
                let path = self.shape.storage_path(&field.field, FieldUsage::Sorting)?;
                sort.insert(path, field.direction.as_i32());
            }
            stage.insert("sort", sort);
        }

        if let Some(marker) = &self.token.search_after {
            stage.insert("searchAfter", marker.as_str());
        }

        Ok(stage)
    }

    fn wildcard_text(&self) -> Document {
        doc! {
            "query": self.text,
            "path": { "wildcard": "*" },
            "fuzzy": {},
        }
    }

    fn compound(
        &self,
        configuration: &SearchConfiguration,
        filters: Vec<Bson>,
    ) -> PaginationResult<Document> {
        let text_paths = configuration
            .text_fields
            .iter()
            .map(|f| resolve_path(self.shape, f))
            .collect::<Result<Vec<_>, _>>()?;
        let max_edits = configuration
            .max_edits
            .unwrap_or(self.settings.default_max_edits);

        let mut compound = doc! {
            "must": [{
                "text": {
                    "query": self.text,
                    "path": text_paths,
                    "fuzzy": { "maxEdits": i32::from(max_edits) },
                }
            }],
        };

        let mut should: Vec<Bson> = Vec::new();
        for boost in &configuration.score_boosts {
            should.push(Bson::Document(doc! {
                "text": {
                    "query": self.text,
                    "path": resolve_path(self.shape, &boost.field)?,
                    "score": boost.score.to_document(self.shape)?,
                }
            }));
        }
        for near in &configuration.near_fields {
            should.push(Bson::Document(near.to_document(self.shape)?));
        }

        if !should.is_empty() {
            compound.insert("should", should);
        }
        if !filters.is_empty() {
            compound.insert("filter", filters);
        }

        Ok(compound)
    }

    fn metadata_stage(&self) -> Document {
        let mut fields = Document::new();
        fields.insert(
            self.settings.score_field.clone(),
            doc! { "$meta": "searchScore" },
        );
        fields.insert(
            self.settings.token_field.clone(),
            doc! { "$meta": "searchSequenceToken" },
        );
        doc! { "$addFields": fields }
    }
}
