use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::domain::{Author, AuthorId, Playlist, Startup, StartupId, StartupViews};
use thiserror::Error;

mod http;
pub mod queries;
mod sqlite;

pub use http::{HttpCms, HttpCmsConfig};
pub use queries::Query;
pub use sqlite::SqliteCms;

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("content request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("content backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode content response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("content store error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("content store migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("document rejected: {0}")]
    Rejected(String),
    #[error("document {0} not found")]
    MissingDocument(String),
    #[error("invalid content backend configuration: {0}")]
    Config(String),
}

pub type Result<T, E = CmsError> = std::result::Result<T, E>;

/// Whether a read may be served from a cache/CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    Cached,
    /// Always hit the live backend. Used where staleness defeats the read.
    Fresh,
}

/// A document creation request: type tag plus field mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub doc_type: String,
    pub fields: Map<String, Value>,
}

impl NewDocument {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            fields: Map::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn into_value(self) -> Value {
        let mut body = self.fields;
        body.insert("_type".into(), Value::String(self.doc_type));
        Value::Object(body)
    }
}

/// Partial update of one document. Nothing is written until [`Patch::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub id: String,
    pub set: Map<String, Value>,
}

impl Patch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            set: Map::new(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub async fn commit(self, writer: &dyn ContentWriter) -> Result<Value> {
        writer.commit_patch(self).await
    }
}

#[async_trait]
pub trait ContentReader: Send + Sync {
    /// Runs a named query. A single-document query that matches nothing
    /// yields `Value::Null`.
    async fn fetch(&self, query: &Query, mode: FetchMode) -> Result<Value>;
}

#[async_trait]
pub trait ContentWriter: Send + Sync {
    /// Creates a document and returns it with its assigned `_id`.
    async fn create(&self, document: NewDocument) -> Result<Value>;
    async fn commit_patch(&self, patch: Patch) -> Result<Value>;
}

/// Typed facade over the read and write collaborators. Constructed once at
/// startup and handed to composers and actions.
#[derive(Clone)]
pub struct CmsClient {
    reader: Arc<dyn ContentReader>,
    writer: Arc<dyn ContentWriter>,
}

impl CmsClient {
    pub fn new(reader: Arc<dyn ContentReader>, writer: Arc<dyn ContentWriter>) -> Self {
        Self { reader, writer }
    }

    /// Uses one backend for both reads and writes.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: ContentReader + ContentWriter + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            reader: backend.clone(),
            writer: backend,
        }
    }

    pub async fn fetch_as<T: DeserializeOwned>(&self, query: &Query, mode: FetchMode) -> Result<T> {
        let value = self.reader.fetch(query, mode).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn startups(&self, search: Option<&str>) -> Result<Vec<Startup>> {
        let query = Query::Startups {
            search: search.map(str::to_string),
        };
        let startups: Option<Vec<Startup>> = self.fetch_as(&query, FetchMode::Cached).await?;
        Ok(startups.unwrap_or_default())
    }

    pub async fn startup_by_id(&self, id: &StartupId) -> Result<Option<Startup>> {
        self.fetch_as(&Query::StartupById { id: id.clone() }, FetchMode::Cached)
            .await
    }

    pub async fn startup_views(&self, id: &StartupId) -> Result<Option<StartupViews>> {
        self.fetch_as(&Query::StartupViews { id: id.clone() }, FetchMode::Fresh)
            .await
    }

    pub async fn playlist_by_slug(&self, slug: &str) -> Result<Option<Playlist>> {
        let query = Query::PlaylistBySlug {
            slug: slug.to_string(),
        };
        self.fetch_as(&query, FetchMode::Cached).await
    }

    pub async fn author_by_id(&self, id: &AuthorId) -> Result<Option<Author>> {
        self.fetch_as(&Query::AuthorById { id: id.clone() }, FetchMode::Cached)
            .await
    }

    /// Read live: it guards author creation, and a stale miss would create
    /// a duplicate.
    pub async fn author_by_external_id(&self, id: &str) -> Result<Option<Author>> {
        let query = Query::AuthorByExternalId { id: id.to_string() };
        self.fetch_as(&query, FetchMode::Fresh).await
    }

    pub async fn startups_by_author(&self, id: &AuthorId) -> Result<Vec<Startup>> {
        let query = Query::StartupsByAuthor { id: id.clone() };
        let startups: Option<Vec<Startup>> = self.fetch_as(&query, FetchMode::Cached).await?;
        Ok(startups.unwrap_or_default())
    }

    pub async fn create(&self, document: NewDocument) -> Result<Value> {
        self.writer.create(document).await
    }

    pub async fn commit(&self, patch: Patch) -> Result<Value> {
        patch.commit(self.writer.as_ref()).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
