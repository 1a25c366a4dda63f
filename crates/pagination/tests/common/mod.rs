//! Shared fixtures for the integration tests.
//!
//! Provides a `Post` entity, seeded in-memory stores, and a scripted search
//! executor that answers `$search` pipelines from a ranked list of hits.

#![allow(dead_code)]

use std::fmt::Debug;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

use strata_pagination::backends::memory::MemoryStore;
use strata_pagination::core::{BackendCapability, BackendKind};
use strata_pagination::entity::{EntityShape, PagedEntity};
use strata_pagination::error::{BackendError, PaginationResult};
use strata_pagination::query::FieldQuery;
use strata_pagination::types::{PageToken, PaginationRequest};
use strata_pagination::{Paginator, QueryExecutor};

/// Collection the `Post` fixtures live in.
pub const POSTS: &str = "posts";

/// Base timestamp for `createdAt` values.
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// `epoch() + seconds`.
pub fn at(seconds: i64) -> DateTime<Utc> {
    epoch() + Duration::seconds(seconds)
}

/// Author sub-document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub status: String,
    #[serde(rename = "createdAt")]
    pub created_at: bson::DateTime,
    pub likes: i32,
    pub author: Author,
}

impl PagedEntity for Post {
    fn entity_shape() -> EntityShape {
        post_shape()
    }
}

/// Entity declaration for posts.
///
/// `author` maps to the nested `author.id`; `secret` is declared but may
/// not be used by clients.
pub fn post_shape() -> EntityShape {
    EntityShape::new("Post", POSTS)
        .with_attributes(["title", "status", "createdAt", "likes", "body", "secret"])
        .with_mapping("author", "author.id")
        .with_mapping("authorName", "author.name")
        .with_excluded("secret")
}

/// Builds a post document.
pub fn post(title: &str, status: &str, created_at: DateTime<Utc>, likes: i32, author: &str) -> Document {
    doc! {
        "title": title,
        "status": status,
        "createdAt": bson::DateTime::from_chrono(created_at),
        "likes": likes,
        "body": format!("{} body", title),
        "secret": "hunter2",
        "author": { "id": author, "name": author.to_uppercase() },
    }
}

/// Five posts created at `epoch + 100s`, `+200s`, ... `+500s`.
pub fn seeded_timeline() -> MemoryStore {
    let store = MemoryStore::new();
    for n in 1..=5 {
        store.insert(
            POSTS,
            post(&format!("post-{}", n), "published", at(n * 100), n as i32, "ann"),
        );
    }
    store
}

/// One post per status `A`, `B`, `C`, `D`.
pub fn seeded_statuses() -> MemoryStore {
    let store = MemoryStore::new();
    for (n, status) in ["A", "B", "C", "D"].into_iter().enumerate() {
        store.insert(
            POSTS,
            post(&format!("post-{}", status), status, at(n as i64), 0, "ann"),
        );
    }
    store
}

/// `count` posts with heavily duplicated `status` and `likes` values.
pub fn seeded_with_ties(count: usize) -> MemoryStore {
    let store = MemoryStore::new();
    let statuses = ["draft", "published", "archived"];
    for n in 0..count {
        store.insert(
            POSTS,
            post(
                &format!("post-{:02}", n),
                statuses[n % statuses.len()],
                at((n % 4) as i64),
                (n % 5) as i32,
                if n % 2 == 0 { "ann" } else { "bob" },
            ),
        );
    }
    store
}

/// Store of `readings` rows named by `name`, each with the given `value`
/// (`None` leaves the field out), inserted in order.
pub fn readings(rows: &[(&str, Option<Bson>)]) -> (MemoryStore, EntityShape) {
    let store = MemoryStore::new();
    for (name, value) in rows {
        let mut row = doc! { "name": *name };
        if let Some(value) = value {
            row.insert("value", value.clone());
        }
        store.insert("readings", row);
    }
    let shape = EntityShape::new("Reading", "readings").with_attributes(["name", "value"]);
    (store, shape)
}

/// Names of every row a field-backed list returns, following next-page
/// tokens through their string form.
pub async fn walk_names<E: QueryExecutor>(
    paginator: &Paginator<E>,
    shape: &EntityShape,
    mut request: PaginationRequest,
) -> Vec<String> {
    let mut names = Vec::new();
    for _ in 0..50 {
        let page = paginator.get_page(shape, &request).await.expect("page");
        names.extend(
            page.items
                .iter()
                .map(|row| row.get_str("name").unwrap_or_default().to_string()),
        );
        match page.encoded_next_token().expect("token encodes") {
            Some(raw) => {
                request = request.with_token(PageToken::decode(&raw).expect("token decodes"))
            }
            None => break,
        }
    }
    names
}

/// Titles of a page of raw post documents.
pub fn titles(rows: &[Document]) -> Vec<String> {
    rows.iter()
        .map(|row| row.get_str("title").unwrap_or_default().to_string())
        .collect()
}

/// Search executor answering from a fixed ranking.
///
/// Hit `i` carries the continuation marker `marker-{i}` and score
/// `count - i`. A `searchAfter` marker resumes after the hit that issued it;
/// `$limit` caps the rows returned. Every pipeline is recorded.
pub struct ScriptedSearch {
    hits: Vec<Document>,
    capabilities: Vec<BackendCapability>,
    pipelines: Mutex<Vec<Vec<Document>>>,
}

impl Debug for ScriptedSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedSearch")
            .field("hits", &self.hits.len())
            .field("pipelines", &self.pipelines.lock().len())
            .finish()
    }
}

impl ScriptedSearch {
    /// Ranks `hits` in the order given.
    pub fn new(hits: Vec<Document>) -> Self {
        Self {
            hits,
            capabilities: vec![BackendCapability::FullTextSearch],
            pipelines: Mutex::new(Vec::new()),
        }
    }

    /// Declares no capabilities, as a plain document store would.
    pub fn without_search(mut self) -> Self {
        self.capabilities.clear();
        self
    }

    /// `count` posts titled `hit-00`, `hit-01`, ...
    pub fn with_posts(count: usize) -> Self {
        let hits = (0..count)
            .map(|n| {
                let mut row = post(&format!("hit-{:02}", n), "published", at(n as i64), 0, "ann");
                row.insert("_id", ObjectId::new());
                row
            })
            .collect();
        Self::new(hits)
    }

    /// Pipelines received so far.
    pub fn pipelines(&self) -> Vec<Vec<Document>> {
        self.pipelines.lock().clone()
    }

    /// The `$search` stage body of the `n`th pipeline.
    pub fn search_stage(&self, n: usize) -> Document {
        self.pipelines.lock()[n][0]
            .get_document("$search")
            .unwrap()
            .clone()
    }

    /// Number of pipelines received.
    pub fn calls(&self) -> usize {
        self.pipelines.lock().len()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedSearch {
    fn kind(&self) -> BackendKind {
        BackendKind::Custom("scripted")
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn capabilities(&self) -> Vec<BackendCapability> {
        self.capabilities.clone()
    }

    async fn find(&self, _query: &FieldQuery) -> PaginationResult<Vec<Document>> {
        Err(BackendError::UnsupportedCapability {
            backend_name: "scripted".to_string(),
            capability: BackendCapability::FieldQuery.to_string(),
        }
        .into())
    }

    async fn aggregate(
        &self,
        _collection: &str,
        pipeline: &[Document],
    ) -> PaginationResult<Vec<Document>> {
        self.pipelines.lock().push(pipeline.to_vec());

        let mut start = 0;
        let mut limit = self.hits.len();
        for stage in pipeline {
            if let Ok(search) = stage.get_document("$search")
                && let Ok(marker) = search.get_str("searchAfter")
            {
                let issued: usize = marker
                    .trim_start_matches("marker-")
                    .parse()
                    .map_err(|_| BackendError::QueryError {
                        message: format!("bad marker {}", marker),
                    })?;
                start = issued + 1;
            }
            if let Some(Bson::Int64(n)) = stage.get("$limit") {
                limit = *n as usize;
            }
        }

        let total = self.hits.len();
        Ok(self
            .hits
            .iter()
            .enumerate()
            .skip(start)
            .take(limit)
            .map(|(i, hit)| {
                let mut row = hit.clone();
                row.insert("score", (total - i) as f64);
                row.insert("paginationToken", format!("marker-{}", i));
                row
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
