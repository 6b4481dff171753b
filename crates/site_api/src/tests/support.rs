use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use auth::{AuthError, Credentials, Session, SessionProvider};
use cms::{CmsClient, CmsError, ContentWriter, NewDocument, Patch, SqliteCms};
use serde_json::{json, Value};
use shared::domain::{StartupId, AUTHOR_TYPE, PLAYLIST_TYPE, STARTUP_TYPE};

use crate::ApiContext;

pub(crate) struct FixedSession(pub(crate) Option<Session>);

#[async_trait]
impl SessionProvider for FixedSession {
    async fn current_session(&self, _credentials: &Credentials) -> Result<Option<Session>, AuthError> {
        Ok(self.0.clone())
    }
}

/// Session whose subject matches the external id given by `seed_author(id, ..)`.
pub(crate) fn session(id: &str) -> Session {
    Session {
        subject: format!("gh-{id}"),
        name: Some("Ada".into()),
        username: Some("ada".into()),
        image: None,
    }
}

/// Forwards to the store while counting writes.
pub(crate) struct RecordingWriter {
    pub(crate) inner: SqliteCms,
    pub(crate) creates: AtomicUsize,
    pub(crate) patches: AtomicUsize,
    pub(crate) reject_with: Option<String>,
}

#[async_trait]
impl ContentWriter for RecordingWriter {
    async fn create(&self, document: NewDocument) -> Result<Value, CmsError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        match &self.reject_with {
            Some(reason) => Err(CmsError::Rejected(reason.clone())),
            None => self.inner.create(document).await,
        }
    }

    async fn commit_patch(&self, patch: Patch) -> Result<Value, CmsError> {
        self.patches.fetch_add(1, Ordering::SeqCst);
        match &self.reject_with {
            Some(reason) => Err(CmsError::Rejected(reason.clone())),
            None => self.inner.commit_patch(patch).await,
        }
    }
}

pub(crate) struct Harness {
    pub(crate) ctx: ApiContext,
    pub(crate) writer: Arc<RecordingWriter>,
}

impl Harness {
    pub(crate) async fn new(session_id: Option<&str>) -> Self {
        Self::build(session_id, None).await
    }

    pub(crate) async fn rejecting_writes(session_id: Option<&str>, reason: &str) -> Self {
        Self::build(session_id, Some(reason.to_string())).await
    }

    async fn build(session_id: Option<&str>, reject_with: Option<String>) -> Self {
        let store = SqliteCms::connect("sqlite::memory:").await.expect("db");
        let writer = Arc::new(RecordingWriter {
            inner: store.clone(),
            creates: AtomicUsize::new(0),
            patches: AtomicUsize::new(0),
            reject_with,
        });
        let cms = CmsClient::new(Arc::new(store), writer.clone());
        let ctx = ApiContext::new(cms, Arc::new(FixedSession(session_id.map(session))));
        Self { ctx, writer }
    }

    pub(crate) fn creates(&self) -> usize {
        self.writer.creates.load(Ordering::SeqCst)
    }

    pub(crate) fn patches(&self) -> usize {
        self.writer.patches.load(Ordering::SeqCst)
    }

    /// Seeds straight into the store so write counters stay untouched.
    pub(crate) async fn seed_author(&self, id: &str, name: &str) {
        self.writer
            .inner
            .create(
                NewDocument::new(AUTHOR_TYPE)
                    .field("_id", id)
                    .field("id", format!("gh-{id}"))
                    .field("name", name)
                    .field("username", name.to_lowercase()),
            )
            .await
            .expect("author");
    }

    pub(crate) async fn seed_startup(
        &self,
        title: &str,
        category: &str,
        author: &str,
        pitch: Option<&str>,
        views: u64,
    ) -> StartupId {
        let created = self
            .writer
            .inner
            .create(
                NewDocument::new(STARTUP_TYPE)
                    .field("title", title)
                    .field("description", "A description that is long enough")
                    .field("category", category)
                    .field("image", "https://example.com/image.png")
                    .field("slug", json!({ "_type": "slug", "current": crate::slugify(title) }))
                    .field("author", json!({ "_type": "reference", "_ref": author }))
                    .field("pitch", json!(pitch))
                    .field("views", views),
            )
            .await
            .expect("startup");
        StartupId::new(created["_id"].as_str().expect("id"))
    }

    pub(crate) async fn seed_picks(&self, slug: &str, picks: &[&StartupId]) {
        let select: Vec<Value> = picks
            .iter()
            .map(|id| json!({ "_type": "reference", "_ref": id.as_str() }))
            .collect();
        self.writer
            .inner
            .create(
                NewDocument::new(PLAYLIST_TYPE)
                    .field("title", "Editor Picks")
                    .field("slug", json!({ "_type": "slug", "current": slug }))
                    .field("select", select),
            )
            .await
            .expect("playlist");
    }

    pub(crate) async fn views(&self, id: &StartupId) -> u64 {
        self.ctx
            .cms
            .startup_views(id)
            .await
            .expect("views")
            .expect("exists")
            .views
    }
}
