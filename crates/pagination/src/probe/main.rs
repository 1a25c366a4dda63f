//! Page Probe CLI
//!
//! Runs paginated list and search reads against a live MongoDB deployment
//! and prints each page as JSON lines. Useful to check an entity
//! declaration, a search configuration or a page token by hand.
//!
//! # Usage
//!
//! ```bash
//! # First two pages of posts, newest first
//! page-probe --database app list --collection posts --fields status,createdAt \
//!     --sort=-createdAt --filter status=published --limit 20 --pages 2
//!
//! # Resume from a token
//! page-probe list --collection posts --fields createdAt --token eyJ2IjoxLC...
//!
//! # Search with a scoring configuration
//! page-probe search --collection posts --index posts_search --fields title,body \
//!     --config search.json "rust async"
//! ```
//!
//! # Environment Variables
//!
//! - `PROBE_MONGO_URI` - Connection string (default: mongodb://localhost:27017)
//! - `PROBE_DATABASE` - Database name (default: strata)
//! - `RUST_LOG` - Log filter (default: info,strata_pagination=debug)

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_pagination::backends::mongodb::{MongoBackend, MongoConfig};
use strata_pagination::entity::EntityShape;
use strata_pagination::search::SearchConfiguration;
use strata_pagination::types::{
    CursorValue, FilterField, PageToken, PaginationRequest, SortField,
};
use strata_pagination::{PaginationConfig, Paginator, QueryExecutor};

#[derive(Debug, Parser)]
#[command(name = "page-probe")]
#[command(about = "Run paginated reads against a MongoDB deployment")]
struct Cli {
    /// MongoDB connection string.
    #[arg(long, env = "PROBE_MONGO_URI", default_value = "mongodb://localhost:27017")]
    uri: String,

    /// Database name.
    #[arg(long, env = "PROBE_DATABASE", default_value = "strata")]
    database: String,

    /// Largest page size honoured.
    #[arg(long, env = "PROBE_MAX_LIMIT", default_value = "100")]
    max_limit: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Page through a field-backed list.
    List(ListArgs),
    /// Page through a search-backed list.
    Search(SearchArgs),
}

#[derive(Debug, Args)]
struct EntityArgs {
    /// Collection to read.
    #[arg(long)]
    collection: String,

    /// Entity name used in error messages (default: the collection name).
    #[arg(long)]
    entity: Option<String>,

    /// Fields clients may use, comma-separated.
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,

    /// Logical-to-storage mappings, e.g. `author=author.id`.
    #[arg(long = "map", value_parser = parse_pair)]
    mappings: Vec<(String, String)>,
}

impl EntityArgs {
    fn shape(&self) -> anyhow::Result<EntityShape> {
        let name = self.entity.clone().unwrap_or_else(|| self.collection.clone());
        let mut shape =
            EntityShape::new(name, self.collection.clone()).with_attributes(self.fields.clone());
        for (field, path) in &self.mappings {
            shape = shape.with_mapping(field.clone(), path.clone());
        }
        shape.validate().context("invalid entity declaration")?;
        Ok(shape)
    }
}

#[derive(Debug, Args)]
struct PageArgs {
    /// Sort fields, comma-separated; prefix with `-` for descending.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    sort: Vec<String>,

    /// Equality filters, e.g. `status=published`.
    #[arg(long = "filter", value_parser = parse_pair)]
    filters: Vec<(String, String)>,

    /// Membership filters, e.g. `status=A|C`.
    #[arg(long = "in", value_parser = parse_pair)]
    in_filters: Vec<(String, String)>,

    /// Page size.
    #[arg(long, default_value = "20")]
    limit: u32,

    /// Token to resume from; overrides --sort and filters.
    #[arg(long)]
    token: Option<String>,

    /// Number of pages to fetch.
    #[arg(long, default_value = "1")]
    pages: usize,
}

impl PageArgs {
    fn first_request(&self) -> anyhow::Result<PaginationRequest> {
        if let Some(raw) = &self.token {
            let token = PageToken::decode(raw).context("invalid page token")?;
            return Ok(PaginationRequest::new(self.limit).with_token(token));
        }

        let mut token = PageToken::new();
        for (field, value) in &self.filters {
            token = token.with_filter(FilterField::equals(field.clone(), parse_value(value)));
        }
        for (field, values) in &self.in_filters {
            token = token.with_filter(FilterField::in_list(
                field.clone(),
                values.split('|').map(parse_value),
            ));
        }
        for sort in &self.sort {
            token = token.with_sort(SortField::parse(sort));
        }

        Ok(PaginationRequest::new(self.limit).with_token(token))
    }
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    entity: EntityArgs,

    #[command(flatten)]
    page: PageArgs,
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[command(flatten)]
    entity: EntityArgs,

    #[command(flatten)]
    page: PageArgs,

    /// Search index name.
    #[arg(long)]
    index: String,

    /// JSON file holding a search configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Search text.
    text: String,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

/// Integers, then floats, then RFC 3339 dates; anything else is a string.
fn parse_value(raw: &str) -> CursorValue {
    if let Ok(n) = raw.parse::<i64>() {
        return CursorValue::Int(n);
    }
    if let Ok(n) = raw.parse::<f64>() {
        return CursorValue::Float(n);
    }
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return CursorValue::Date(d.with_timezone(&Utc));
    }
    CursorValue::from(raw)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strata_pagination=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = PaginationConfig {
        max_limit: cli.max_limit,
        ..Default::default()
    };

    let backend = MongoBackend::connect(MongoConfig::new(&cli.uri, &cli.database)).await?;
    backend.health_check().await?;
    tracing::info!(database = %cli.database, "Connected");

    let paginator = Paginator::with_config(backend, config)?;

    match cli.command {
        Command::List(args) => {
            let shape = args.entity.shape()?;
            let mut request = args.page.first_request()?;

            for page_number in 1..=args.page.pages {
                let page = paginator.get_page(&shape, &request).await?;
                for item in &page.items {
                    println!("{}", serde_json::to_string(item)?);
                }
                tracing::info!(page = page_number, items = page.len(), "Page done");

                match page.next_page_token {
                    Some(token) => {
                        println!("# next: {}", token.encode()?);
                        request = request.with_token(token);
                    }
                    None => break,
                }
            }
        }
        Command::Search(args) => {
            let shape = args.entity.shape()?;
            let configuration: Option<SearchConfiguration> = match &args.config {
                Some(path) => {
                    let raw = std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Some(serde_json::from_str(&raw).context("invalid search configuration")?)
                }
                None => None,
            };
            let mut request = args.page.first_request()?;

            for page_number in 1..=args.page.pages {
                let page = paginator
                    .search_scored(
                        &shape,
                        &args.index,
                        &request,
                        &args.text,
                        configuration.as_ref(),
                    )
                    .await?;
                for hit in &page.items {
                    println!(
                        "{:.4}\t{}",
                        hit.score,
                        serde_json::to_string(&hit.item)?
                    );
                }
                tracing::info!(page = page_number, items = page.len(), "Page done");

                match page.next_page_token {
                    Some(token) => {
                        println!("# next: {}", token.encode()?);
                        request = request.with_token(token);
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}
