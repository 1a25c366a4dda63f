//! The paginator: builds a query, runs it, returns one page.

use bson::Document;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::PaginationConfig;
use crate::core::{BackendCapability, QueryExecutor};
use crate::entity::{EntityShape, PagedEntity};
use crate::error::{BackendError, PaginationError, PaginationResult, ValidationError};
use crate::query::FieldQueryBuilder;
use crate::search::{SearchConfiguration, SearchPipelineBuilder};
use crate::types::{PaginationRequest, PaginationSlice, Scored};

/// Runs paginated list and search reads against one executor.
///
/// A paginator is immutable and can be shared between tasks. Every call
/// checks that the executor has the capability it needs and validates the
/// request first; a rejected request never reaches the executor.
///
/// # Example
///
/// ```
/// use bson::doc;
/// use strata_pagination::backends::memory::MemoryStore;
/// use strata_pagination::entity::EntityShape;
/// use strata_pagination::types::{PageToken, PaginationRequest, SortField};
/// use strata_pagination::Paginator;
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store.insert_many("posts", (1..=3).map(|n| doc! { "n": n }));
///
/// let shape = EntityShape::new("Post", "posts").with_attribute("n");
/// let paginator = Paginator::new(store);
///
/// let request = PaginationRequest::new(2).with_token(PageToken::new().with_sort(SortField::asc("n")));
/// let page = paginator.get_page(&shape, &request).await.unwrap();
/// assert_eq!(page.len(), 2);
/// assert!(page.has_next());
/// # });
/// ```
#[derive(Debug)]
pub struct Paginator<E> {
    executor: E,
    config: PaginationConfig,
}

impl<E: QueryExecutor> Paginator<E> {
    /// Creates a paginator with the default configuration.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            config: PaginationConfig::default(),
        }
    }

    /// Creates a paginator with a custom configuration.
    ///
    /// Fails with [`PaginationError::Configuration`] when the configuration
    /// does not validate.
    pub fn with_config(executor: E, config: PaginationConfig) -> PaginationResult<Self> {
        config
            .validate()
            .map_err(|errors| PaginationError::Configuration { errors })?;
        Ok(Self { executor, config })
    }

    /// Returns the executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Returns one page of a field-backed list as raw documents.
    #[instrument(
        skip_all,
        fields(entity = %shape.name(), backend = %self.executor.kind(), limit = request.limit)
    )]
    pub async fn get_page(
        &self,
        shape: &EntityShape,
        request: &PaginationRequest,
    ) -> PaginationResult<PaginationSlice<Document>> {
        self.require(BackendCapability::FieldQuery)?;
        let limit = self.applied_limit(request)?;
        let builder = FieldQueryBuilder::new(shape, &request.page_token, limit)
            .with_strategy(self.config.seek_strategy);
        let query = builder.build()?;

        debug!(
            collection = %query.collection,
            filter = %query.filter,
            sort = %query.sort,
            "Running field query"
        );

        let rows = self.executor.find(&query).await?;
        let fetched = rows.len();
        let (items, next_page_token) = builder.paginate(rows)?;

        debug!(
            fetched,
            returned = items.len(),
            has_next = next_page_token.is_some(),
            "Field query page"
        );

        Ok(PaginationSlice::new(items, next_page_token))
    }

    /// Returns one page of a field-backed list of `T`.
    pub async fn list<T: PagedEntity>(
        &self,
        request: &PaginationRequest,
    ) -> PaginationResult<PaginationSlice<T>> {
        let shape = T::entity_shape();
        let page = self.get_page(&shape, request).await?;
        deserialize_slice(page)
    }

    /// Returns one page of a search-backed list as raw documents.
    ///
    /// The score and continuation metadata are removed from each row.
    pub async fn search(
        &self,
        shape: &EntityShape,
        index: &str,
        request: &PaginationRequest,
        text: &str,
        configuration: Option<&SearchConfiguration>,
    ) -> PaginationResult<PaginationSlice<Document>> {
        let page = self
            .search_scored(shape, index, request, text, configuration)
            .await?;
        Ok(page.map(|hit| hit.item))
    }

    /// Returns one page of a search-backed list with relevance scores.
    #[instrument(
        skip_all,
        fields(
            entity = %shape.name(),
            backend = %self.executor.kind(),
            index = %index,
            limit = request.limit
        )
    )]
    pub async fn search_scored(
        &self,
        shape: &EntityShape,
        index: &str,
        request: &PaginationRequest,
        text: &str,
        configuration: Option<&SearchConfiguration>,
    ) -> PaginationResult<PaginationSlice<Scored<Document>>> {
        self.require(BackendCapability::FullTextSearch)?;
        let limit = self.applied_limit(request)?;
        let builder = SearchPipelineBuilder::new(
            shape,
            index,
            &request.page_token,
            text,
            limit,
            &self.config.search,
        )
        .with_configuration(configuration);
        let pipeline = builder.build()?;

        debug!(
            collection = %pipeline.collection,
            page_size = pipeline.page_size,
            resumed = request.page_token.search_after.is_some(),
            "Running search pipeline"
        );

        let rows = self
            .executor
            .aggregate(&pipeline.collection, &pipeline.stages)
            .await?;
        let fetched = rows.len();
        let (rows, next_page_token) = builder.paginate(rows)?;

        let items: Vec<Scored<Document>> = rows
            .into_iter()
            .map(|mut row| {
                let score = builder.take_score(&mut row);
                Scored { item: row, score }
            })
            .collect();

        debug!(
            fetched,
            returned = items.len(),
            has_next = next_page_token.is_some(),
            "Search page"
        );

        Ok(PaginationSlice::new(items, next_page_token))
    }

    /// Returns one page of a search-backed list of `T` with relevance scores.
    pub async fn search_entities<T: PagedEntity>(
        &self,
        index: &str,
        request: &PaginationRequest,
        text: &str,
        configuration: Option<&SearchConfiguration>,
    ) -> PaginationResult<PaginationSlice<Scored<T>>> {
        let shape = T::entity_shape();
        let page = self
            .search_scored(&shape, index, request, text, configuration)
            .await?;

        let mut items = Vec::with_capacity(page.items.len());
        for hit in page.items {
            items.push(Scored {
                item: bson::from_document(hit.item)?,
                score: hit.score,
            });
        }
        Ok(PaginationSlice::new(items, page.next_page_token))
    }

    fn require(&self, capability: BackendCapability) -> PaginationResult<()> {
        if self.executor.supports(capability) {
            return Ok(());
        }
        Err(BackendError::UnsupportedCapability {
            backend_name: self.executor.name().to_string(),
            capability: capability.to_string(),
        }
        .into())
    }

    fn applied_limit(&self, request: &PaginationRequest) -> PaginationResult<u32> {
        if request.limit == 0 {
            return Err(ValidationError::InvalidLimit {
                limit: request.limit.to_string(),
            }
            .into());
        }
        Ok(request.limit.min(self.config.max_limit))
    }
}

fn deserialize_slice<T: DeserializeOwned>(
    page: PaginationSlice<Document>,
) -> PaginationResult<PaginationSlice<T>> {
    let items = page
        .items
        .into_iter()
        .map(bson::from_document)
        .collect::<Result<Vec<T>, _>>()?;
    Ok(PaginationSlice::new(items, page.next_page_token))
}
