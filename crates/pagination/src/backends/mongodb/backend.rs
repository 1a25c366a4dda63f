//! MongoDB executor implementation.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use ::mongodb::options::ClientOptions;
use ::mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};

use crate::core::{BackendCapability, BackendKind, QueryExecutor};
use crate::error::{BackendError, PaginationError, PaginationResult};
use crate::query::FieldQuery;

/// Configuration for the MongoDB backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string (default: `"mongodb://localhost:27017"`).
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Database name (default: `"strata"`).
    #[serde(default = "default_database")]
    pub database: String,

    /// Application name reported to the server.
    #[serde(default)]
    pub app_name: Option<String>,

    /// Maximum number of connections in the pool (default: 10).
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    /// Minimum number of idle connections (default: 1).
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: u32,

    /// Connection timeout in milliseconds (default: 5000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Server selection timeout in milliseconds (default: 30000).
    #[serde(default = "default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
}

fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "strata".to_string()
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_min_pool_size() -> u32 {
    1
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_server_selection_timeout_ms() -> u64 {
    30000
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            app_name: None,
            max_pool_size: default_max_pool_size(),
            min_pool_size: default_min_pool_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
            server_selection_timeout_ms: default_server_selection_timeout_ms(),
        }
    }
}

impl MongoConfig {
    /// Creates a configuration for `uri` and `database`.
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.uri.starts_with("mongodb://") && !self.uri.starts_with("mongodb+srv://") {
            errors.push("MongoDB URI must use the mongodb:// or mongodb+srv:// scheme".to_string());
        }

        if self.database.trim().is_empty() {
            errors.push("MongoDB database name cannot be empty".to_string());
        }

        if self.max_pool_size == 0 {
            errors.push("Max pool size cannot be 0".to_string());
        }

        if self.min_pool_size > self.max_pool_size {
            errors.push("Min pool size cannot exceed max pool size".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// MongoDB backend: field queries through `find`, search-backed lists
/// through Atlas Search aggregations.
#[derive(Clone)]
pub struct MongoBackend {
    client: Client,
    database: Database,
    config: MongoConfig,
}

impl Debug for MongoBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoBackend")
            .field("database", &self.config.database)
            .field("max_pool_size", &self.config.max_pool_size)
            .finish_non_exhaustive()
    }
}

impl MongoBackend {
    /// Connects using the given configuration.
    ///
    /// The driver connects lazily; use [`health_check`](QueryExecutor::health_check)
    /// to verify the server is reachable.
    pub async fn connect(config: MongoConfig) -> PaginationResult<Self> {
        if let Err(errors) = config.validate() {
            return Err(BackendError::ConnectionFailed {
                backend_name: "mongodb".to_string(),
                message: errors.join("; "),
            }
            .into());
        }

        let mut options = ClientOptions::parse(&config.uri).await.map_err(|e| {
            PaginationError::Backend(BackendError::ConnectionFailed {
                backend_name: "mongodb".to_string(),
                message: format!("Invalid URI: {}", e),
            })
        })?;

        if let Some(app_name) = &config.app_name {
            options.app_name = Some(app_name.clone());
        }
        options.max_pool_size = Some(config.max_pool_size);
        options.min_pool_size = Some(config.min_pool_size);
        options.connect_timeout = Some(Duration::from_millis(config.connect_timeout_ms));
        options.server_selection_timeout =
            Some(Duration::from_millis(config.server_selection_timeout_ms));

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);

        tracing::info!(
            database = %config.database,
            max_pool_size = config.max_pool_size,
            "MongoDB backend initialized"
        );

        Ok(Self {
            client,
            database,
            config,
        })
    }

    /// Wraps an existing client.
    pub fn from_client(client: Client, database: impl Into<String>) -> Self {
        let config = MongoConfig {
            database: database.into(),
            ..Default::default()
        };
        let database = client.database(&config.database);
        Self {
            client,
            database,
            config,
        }
    }

    /// Returns the driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl QueryExecutor for MongoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDB
    }

    fn name(&self) -> &'static str {
        "mongodb"
    }

    fn capabilities(&self) -> Vec<BackendCapability> {
        vec![
            BackendCapability::FieldQuery,
            BackendCapability::FullTextSearch,
        ]
    }

    async fn find(&self, query: &FieldQuery) -> PaginationResult<Vec<Document>> {
        tracing::trace!(
            collection = %query.collection,
            filter = %query.filter,
            sort = %query.sort,
            limit = query.limit,
            "find"
        );

        let cursor = self
            .collection(&query.collection)
            .find(query.filter.clone())
            .sort(query.sort.clone())
            .limit(query.limit)
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> PaginationResult<Vec<Document>> {
        tracing::trace!(collection = %collection, stages = pipeline.len(), "aggregate");

        let cursor = self
            .collection(collection)
            .aggregate(pipeline.to_vec())
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Unavailable {
                backend_name: "mongodb".to_string(),
                message: e.to_string(),
            })
    }
}
