use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::{CmsError, ContentReader, ContentWriter, FetchMode, NewDocument, Patch, Query, Result};

#[derive(Debug, Clone)]
pub struct HttpCmsConfig {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    /// Required for writes; optional for reads of a public dataset.
    pub token: Option<String>,
    pub use_cdn: bool,
    /// Replaces both the live and CDN hosts, e.g. for a local proxy.
    pub base_url: Option<String>,
}

impl Default for HttpCmsConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset: "production".into(),
            api_version: "2024-10-14".into(),
            token: None,
            use_cdn: true,
            base_url: None,
        }
    }
}

/// Client for the hosted content backend's HTTP query and mutation API.
#[derive(Clone)]
pub struct HttpCms {
    http: Client,
    config: HttpCmsConfig,
    live_base: Url,
    cdn_base: Url,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutationResult>,
}

#[derive(Debug, Deserialize)]
struct MutationResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    document: Option<Value>,
}

impl HttpCms {
    pub fn new(config: HttpCmsConfig) -> Result<Self> {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: HttpCmsConfig) -> Result<Self> {
        if config.dataset.trim().is_empty() {
            return Err(CmsError::Config("dataset must not be empty".into()));
        }
        let version = config.api_version.trim_start_matches('v');
        let (live, cdn) = match config.base_url.as_deref() {
            Some(base) => {
                let base = base.trim_end_matches('/');
                (format!("{base}/v{version}/"), format!("{base}/v{version}/"))
            }
            None => {
                if config.project_id.trim().is_empty() {
                    return Err(CmsError::Config("project id must not be empty".into()));
                }
                let project = config.project_id.trim();
                (
                    format!("https://{project}.api.sanity.io/v{version}/"),
                    format!("https://{project}.apicdn.sanity.io/v{version}/"),
                )
            }
        };
        let live_base = Url::parse(&live).map_err(|e| CmsError::Config(e.to_string()))?;
        let cdn_base = Url::parse(&cdn).map_err(|e| CmsError::Config(e.to_string()))?;
        Ok(Self {
            http,
            config,
            live_base,
            cdn_base,
        })
    }

    fn endpoint(&self, base: &Url, action: &str) -> Result<Url> {
        base.join(&format!("data/{action}/{}", self.config.dataset))
            .map_err(|e| CmsError::Config(e.to_string()))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn mutate(&self, mutation: Value) -> Result<MutationResult> {
        if self.config.token.is_none() {
            return Err(CmsError::Config("writes require an API token".into()));
        }
        let mut url = self.endpoint(&self.live_base, "mutate")?;
        url.query_pairs_mut()
            .append_pair("returnIds", "true")
            .append_pair("returnDocuments", "true")
            .append_pair("visibility", "sync");

        let response = self
            .authorize(self.http.post(url))
            .json(&json!({ "mutations": [mutation] }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CmsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body: MutateResponse = response.json().await?;
        body.results
            .into_iter()
            .next()
            .ok_or_else(|| CmsError::Rejected("mutation returned no results".into()))
    }
}

#[async_trait]
impl ContentReader for HttpCms {
    async fn fetch(&self, query: &Query, mode: FetchMode) -> Result<Value> {
        let base = match mode {
            FetchMode::Cached if self.config.use_cdn => &self.cdn_base,
            _ => &self.live_base,
        };
        let mut url = self.endpoint(base, "query")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query.text());
            for (name, value) in query.params() {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }
        debug!(query = query.name(), ?mode, "content query");

        let response = self.authorize(self.http.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CmsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body: QueryResponse = response.json().await?;
        Ok(body.result)
    }
}

#[async_trait]
impl ContentWriter for HttpCms {
    async fn create(&self, document: NewDocument) -> Result<Value> {
        let body = document.into_value();
        debug!(doc_type = %body["_type"], "content create");
        let result = self.mutate(json!({ "create": body.clone() })).await?;
        match (result.document, result.id) {
            (Some(document), _) => Ok(document),
            (None, Some(id)) => {
                let mut body = body;
                body["_id"] = Value::String(id);
                Ok(body)
            }
            (None, None) => Err(CmsError::Rejected("create returned no document id".into())),
        }
    }

    async fn commit_patch(&self, patch: Patch) -> Result<Value> {
        debug!(id = %patch.id, "content patch");
        let id = patch.id.clone();
        let result = self
            .mutate(json!({ "patch": { "id": patch.id, "set": patch.set } }))
            .await?;
        result
            .document
            .ok_or(CmsError::MissingDocument(id))
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
