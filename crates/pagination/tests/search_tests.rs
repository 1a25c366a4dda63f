//! Search-backed list pagination against a scripted search executor.

mod common;

use std::collections::HashSet;

use bson::{Bson, Document, doc};

use strata_pagination::config::SearchSettings;
use strata_pagination::error::{BackendError, PaginationError, SearchError, ValidationError};
use strata_pagination::search::{
    GeoPoint, NearField, Score, ScoreExpression, SearchConfiguration, SearchPipelineBuilder,
};
use strata_pagination::types::{FilterField, PageToken, PaginationRequest, SortField};
use strata_pagination::Paginator;

use common::*;

const INDEX: &str = "posts_search";

fn configuration() -> SearchConfiguration {
    SearchConfiguration::new(["title", "body"]).with_max_edits(1)
}

// ============================================================================
// Page size and continuation
// ============================================================================

#[tokio::test]
async fn test_page_size_capped_by_engine_limit() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(30));

    let page = paginator
        .search(&post_shape(), INDEX, &PaginationRequest::new(50), "rust", None)
        .await
        .unwrap();

    assert_eq!(page.len(), 10);
    assert!(page.has_next());

    let pipeline = &paginator.executor().pipelines()[0];
    assert_eq!(pipeline.last().unwrap(), &doc! { "$limit": 11i64 });
}

#[tokio::test]
async fn test_walks_every_hit_once() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(25));
    let mut request = PaginationRequest::new(10);
    let mut sizes = Vec::new();
    let mut seen = Vec::new();

    loop {
        let page = paginator
            .search(&post_shape(), INDEX, &request, "rust", Some(&configuration()))
            .await
            .unwrap();
        sizes.push(page.len());
        seen.extend(titles(&page.items));
        match page.encoded_next_token().unwrap() {
            Some(raw) => request = request.with_token(PageToken::decode(&raw).unwrap()),
            None => break,
        }
    }

    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(seen.len(), 25);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 25);

    let executor = paginator.executor();
    assert!(!executor.search_stage(0).contains_key("searchAfter"));
    assert_eq!(executor.search_stage(1).get_str("searchAfter").unwrap(), "marker-9");
    assert_eq!(executor.search_stage(2).get_str("searchAfter").unwrap(), "marker-19");
}

#[tokio::test]
async fn test_exact_page_has_no_next() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(10));

    let page = paginator
        .search(&post_shape(), INDEX, &PaginationRequest::new(10), "rust", None)
        .await
        .unwrap();

    assert_eq!(page.len(), 10);
    assert!(!page.has_next());
}

#[tokio::test]
async fn test_next_token_keeps_filters_and_sorts() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(5));
    let token = PageToken::new()
        .with_filter(FilterField::equals("status", "published"))
        .with_sort(SortField::desc("createdAt"));

    let page = paginator
        .search(
            &post_shape(),
            INDEX,
            &PaginationRequest::new(2).with_token(token.clone()),
            "rust",
            None,
        )
        .await
        .unwrap();

    let next = page.next_page_token.unwrap();
    assert_eq!(next.filters, token.filters);
    assert_eq!(next.sort_fields, token.sort_fields);
    assert_eq!(next.search_after.as_deref(), Some("marker-1"));
    assert!(next.cursors.is_empty());
}

#[tokio::test]
async fn test_scores_exposed_and_metadata_stripped() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(4));

    let scored = paginator
        .search_scored(&post_shape(), INDEX, &PaginationRequest::new(3), "rust", None)
        .await
        .unwrap();

    let scores: Vec<f64> = scored.items.iter().map(|hit| hit.score).collect();
    assert_eq!(scores, vec![4.0, 3.0, 2.0]);
    for hit in &scored.items {
        assert!(!hit.item.contains_key("score"));
        assert!(!hit.item.contains_key("paginationToken"));
    }
}

#[tokio::test]
async fn test_search_entities_deserializes() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(3));

    let page = paginator
        .search_entities::<Post>(INDEX, &PaginationRequest::new(5), "rust", None)
        .await
        .unwrap();

    let titles: Vec<&str> = page.items.iter().map(|hit| hit.item.title.as_str()).collect();
    assert_eq!(titles, vec!["hit-00", "hit-01", "hit-02"]);
    assert_eq!(page.items[0].score, 3.0);
}

#[test]
fn test_missing_marker_is_an_error() {
    let shape = post_shape();
    let token = PageToken::new();
    let settings = SearchSettings::default();
    let builder = SearchPipelineBuilder::new(&shape, INDEX, &token, "rust", 1, &settings);

    let rows = vec![doc! { "title": "a" }, doc! { "title": "b" }];
    let err = builder.paginate(rows).unwrap_err();

    assert!(matches!(
        err,
        PaginationError::Search(SearchError::MissingContinuation { .. })
    ));
}

// ============================================================================
// Pipeline shape
// ============================================================================

#[tokio::test]
async fn test_unconfigured_search_is_wildcard_text() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(1));
    paginator
        .search(&post_shape(), INDEX, &PaginationRequest::new(5), "rust", None)
        .await
        .unwrap();

    let stage = paginator.executor().search_stage(0);
    assert_eq!(stage.get_str("index").unwrap(), INDEX);
    assert_eq!(
        stage.get_document("text").unwrap(),
        &doc! { "query": "rust", "path": { "wildcard": "*" }, "fuzzy": {} }
    );

    let metadata = &paginator.executor().pipelines()[0][1];
    assert_eq!(
        metadata,
        &doc! {
            "$addFields": {
                "score": { "$meta": "searchScore" },
                "paginationToken": { "$meta": "searchSequenceToken" },
            }
        }
    );
}

#[tokio::test]
async fn test_unconfigured_search_keeps_filters_and_sort() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(1));
    let token = PageToken::new()
        .with_filter(FilterField::in_list("status", ["A", "C"]))
        .with_filter(FilterField::equals("author", "ann"))
        .with_sort(SortField::desc("createdAt"));

    paginator
        .search(
            &post_shape(),
            INDEX,
            &PaginationRequest::new(5).with_token(token),
            "rust",
            None,
        )
        .await
        .unwrap();

    let stage = paginator.executor().search_stage(0);
    let compound = stage.get_document("compound").unwrap();
    assert_eq!(
        compound.get_array("filter").unwrap(),
        &vec![
            Bson::Document(doc! {
                "queryString": { "defaultPath": "status", "query": "\"A\" OR \"C\"" }
            }),
            Bson::Document(doc! { "text": { "query": "ann", "path": "author.id" } }),
        ]
    );
    assert_eq!(stage.get_document("sort").unwrap(), &doc! { "createdAt": -1 });
}

#[tokio::test]
async fn test_configured_search_renders_compound() {
    let origin = at(0);
    let config = configuration()
        .with_boost("title", Score::boost(3.0))
        .with_near(NearField::Date {
            field: "createdAt".to_string(),
            origin,
            pivot_ms: 86_400_000,
            score: None,
        });
    let paginator = Paginator::new(ScriptedSearch::with_posts(1));

    paginator
        .search(&post_shape(), INDEX, &PaginationRequest::new(5), "rust", Some(&config))
        .await
        .unwrap();

    let stage = paginator.executor().search_stage(0);
    assert_eq!(
        stage.get_document("compound").unwrap(),
        &doc! {
            "must": [{
                "text": {
                    "query": "rust",
                    "path": ["title", "body"],
                    "fuzzy": { "maxEdits": 1 },
                }
            }],
            "should": [
                {
                    "text": {
                        "query": "rust",
                        "path": "title",
                        "score": { "boost": { "value": 3.0 } },
                    }
                },
                {
                    "near": {
                        "path": "createdAt",
                        "origin": bson::DateTime::from_chrono(origin),
                        "pivot": 86_400_000i64,
                    }
                },
            ],
        }
    );
}

#[tokio::test]
async fn test_config_fields_resolve_to_storage_paths() {
    let config = SearchConfiguration::new(["authorName"])
        .with_boost(
            "title",
            Score::function(ScoreExpression::Multiply(vec![
                ScoreExpression::Relevance,
                ScoreExpression::Log1p(Box::new(ScoreExpression::Path {
                    field: "likes".to_string(),
                    undefined: Some(0.0),
                })),
            ])),
        )
        .with_near(NearField::Geo {
            field: "author".to_string(),
            origin: GeoPoint::new(13.4, 52.5),
            pivot_meters: 1000.0,
            score: None,
        });
    let paginator = Paginator::new(ScriptedSearch::with_posts(1));

    paginator
        .search(&post_shape(), INDEX, &PaginationRequest::new(5), "rust", Some(&config))
        .await
        .unwrap();

    let stage = paginator.executor().search_stage(0);
    let compound = stage.get_document("compound").unwrap();
    let must = compound.get_array("must").unwrap()[0].as_document().unwrap();
    assert_eq!(
        must.get_document("text").unwrap().get_array("path").unwrap(),
        &vec![Bson::String("author.name".to_string())]
    );

    let should = compound.get_array("should").unwrap();
    let near = should[1].as_document().unwrap().get_document("near").unwrap();
    assert_eq!(near.get_str("path").unwrap(), "author.id");
}

/// Raising one boost changes only that boost in the emitted pipeline.
#[tokio::test]
async fn test_higher_boost_only_changes_boost_value() {
    let mut stages = Vec::new();
    for boost in [2.0, 5.0] {
        let config = configuration().with_boost("title", Score::boost(boost));
        let paginator = Paginator::new(ScriptedSearch::with_posts(1));
        paginator
            .search(&post_shape(), INDEX, &PaginationRequest::new(5), "rust", Some(&config))
            .await
            .unwrap();
        stages.push(paginator.executor().search_stage(0));
    }

    let boost_value = |stage: &Document| -> f64 {
        stage.get_document("compound").unwrap().get_array("should").unwrap()[0]
            .as_document()
            .unwrap()
            .get_document("text")
            .unwrap()
            .get_document("score")
            .unwrap()
            .get_document("boost")
            .unwrap()
            .get_f64("value")
            .unwrap()
    };
    assert!(boost_value(&stages[1]) > boost_value(&stages[0]));

    let without_should = |stage: &Document| -> Document {
        let mut stage = stage.clone();
        stage.get_document_mut("compound").unwrap().remove("should");
        stage
    };
    assert_eq!(without_should(&stages[0]), without_should(&stages[1]));
}

// ============================================================================
// Rejections
// ============================================================================

async fn rejected(
    request: PaginationRequest,
    text: &str,
    config: Option<&SearchConfiguration>,
) -> (PaginationError, usize) {
    let paginator = Paginator::new(ScriptedSearch::with_posts(5));
    let err = paginator
        .search(&post_shape(), INDEX, &request, text, config)
        .await
        .unwrap_err();
    (err, paginator.executor().calls())
}

#[tokio::test]
async fn test_executor_without_search_gets_no_pipeline() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(5).without_search());

    let err = paginator
        .search(&post_shape(), INDEX, &PaginationRequest::new(5), "rust", None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaginationError::Backend(BackendError::UnsupportedCapability { ref capability, .. })
            if capability == "full-text-search"
    ));
    assert!(!err.is_client_error());
    assert_eq!(paginator.executor().calls(), 0);
}

#[tokio::test]
async fn test_list_on_search_only_executor_is_unsupported() {
    let paginator = Paginator::new(ScriptedSearch::with_posts(5));

    let err = paginator
        .get_page(&post_shape(), &PaginationRequest::new(5))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaginationError::Backend(BackendError::UnsupportedCapability { ref capability, .. })
            if capability == "field-query"
    ));
}

#[tokio::test]
async fn test_excluded_filter_rejected_before_search() {
    let request = PaginationRequest::new(5)
        .with_token(PageToken::new().with_filter(FilterField::equals("secret", "x")));
    let (err, calls) = rejected(request, "rust", None).await;

    assert!(matches!(
        err,
        PaginationError::Validation(ValidationError::ExcludedField { .. })
    ));
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_blank_text_rejected() {
    let (err, calls) = rejected(PaginationRequest::new(5), "   ", None).await;

    assert!(matches!(err, PaginationError::Search(SearchError::EmptyQuery)));
    assert!(err.is_client_error());
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_malformed_configurations_rejected() {
    let configs = [
        SearchConfiguration::new(Vec::<String>::new()),
        configuration().with_max_edits(3),
        configuration().with_boost("password", Score::boost(2.0)),
        configuration().with_boost("secret", Score::boost(2.0)),
        configuration().with_boost("title", Score::boost(-1.0)),
        configuration().with_boost(
            "title",
            Score::function(ScoreExpression::Add(vec![ScoreExpression::Relevance])),
        ),
        configuration().with_near(NearField::Numeric {
            field: "likes".to_string(),
            origin: 0.0,
            pivot: 0.0,
            score: None,
        }),
        configuration().with_near(NearField::Geo {
            field: "author".to_string(),
            origin: GeoPoint::new(200.0, 0.0),
            pivot_meters: 10.0,
            score: None,
        }),
    ];

    for config in &configs {
        let (err, calls) = rejected(PaginationRequest::new(5), "rust", Some(config)).await;
        assert!(
            matches!(
                err,
                PaginationError::Search(SearchError::InvalidConfiguration { .. })
            ),
            "config {:?} gave {:?}",
            config,
            err
        );
        assert_eq!(calls, 0);
    }
}

#[test]
fn test_configuration_from_json() {
    let json = r#"{
        "text_fields": ["title", "body"],
        "max_edits": 2,
        "score_boosts": [
            { "field": "title", "score": { "type": "boost", "value": 4.0 } }
        ],
        "near_fields": [
            {
                "kind": "numeric",
                "field": "likes",
                "origin": 100.0,
                "pivot": 10.0,
                "score": { "type": "constant", "value": 1.0 }
            }
        ]
    }"#;

    let config: SearchConfiguration = serde_json::from_str(json).unwrap();

    assert_eq!(config.max_edits, Some(2));
    assert_eq!(config.score_boosts[0].score, Score::boost(4.0));
    assert!(config.validate(&post_shape()).is_ok());
}

#[test]
fn test_unknown_near_kind_rejected_at_parse() {
    let json = r#"{
        "text_fields": ["title"],
        "near_fields": [{ "kind": "teleport", "field": "likes" }]
    }"#;

    assert!(serde_json::from_str::<SearchConfiguration>(json).is_err());
}
