use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentBackend {
    /// Hosted content backend over HTTP.
    Http,
    /// Local SQLite content store.
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(alias = "bind_addr")]
    pub server_bind: String,
    pub content_backend: ContentBackend,
    pub database_url: String,
    pub cms_project_id: String,
    pub cms_dataset: String,
    pub cms_api_version: String,
    pub cms_token: Option<String>,
    pub cms_use_cdn: bool,
    pub cms_base_url: Option<String>,
    pub session_secret: String,
    pub editor_picks_slug: String,
    pub verify_image_links: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            content_backend: ContentBackend::Sqlite,
            database_url: "sqlite://./data/content.db".into(),
            cms_project_id: String::new(),
            cms_dataset: "production".into(),
            cms_api_version: "2024-10-14".into(),
            cms_token: None,
            cms_use_cdn: true,
            cms_base_url: None,
            session_secret: "devsecret".into(),
            editor_picks_slug: site_api::DEFAULT_EDITOR_PICKS_SLUG.into(),
            verify_image_links: false,
        }
    }
}

/// Defaults, then `server.toml`, then `APP__*` variables, then the plain
/// variable names shared with the hosted backend's tooling.
pub fn load_settings() -> anyhow::Result<Settings> {
    let file = fs::read_to_string("server.toml").ok();
    settings_from(file.as_deref(), std::env::vars().collect())
}

pub(crate) fn settings_from(
    file: Option<&str>,
    env: HashMap<String, String>,
) -> anyhow::Result<Settings> {
    let mut builder = Config::builder();
    if let Some(raw) = file {
        builder = builder.add_source(File::from_str(raw, FileFormat::Toml));
    }
    let layered = builder
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .source(Some(env.clone())),
        )
        .build()
        .context("failed to read settings")?;
    let mut settings: Settings = layered
        .try_deserialize()
        .context("invalid settings")?;

    if let Some(v) = env.get("SERVER_BIND") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = env.get("DATABASE_URL") {
        settings.database_url = v.clone();
    }
    if let Some(v) = env.get("SANITY_PROJECT_ID") {
        settings.cms_project_id = v.clone();
        settings.content_backend = ContentBackend::Http;
    }
    if let Some(v) = env.get("SANITY_DATASET") {
        settings.cms_dataset = v.clone();
    }
    if let Some(v) = env.get("SANITY_API_VERSION") {
        settings.cms_api_version = v.clone();
    }
    if let Some(v) = env.get("SANITY_WRITE_TOKEN") {
        settings.cms_token = Some(v.clone());
    }
    if let Some(v) = env.get("AUTH_SECRET") {
        settings.session_secret = v.clone();
    }

    Ok(settings)
}

/// Normalizes `raw_database_url` and makes sure a file-backed store has a
/// directory to live in.
pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    let parent = sqlite_file(&database_url)
        .and_then(|file| file.parent().map(Path::to_path_buf))
        .filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(&dir).with_context(|| {
            format!("cannot create '{}' for content store '{database_url}'", dir.display())
        })?;
    }
    Ok(database_url)
}

/// Bare paths and `sqlite:path` become `sqlite://path` with forward slashes.
/// In-memory and other scheme urls pass through.
fn normalize_database_url(raw_database_url: &str) -> String {
    match raw_database_url.trim() {
        "" => Settings::default().database_url,
        url if url.starts_with("sqlite::memory:") || url.contains("://") => url.to_string(),
        path => {
            let path = path.strip_prefix("sqlite:").unwrap_or(path);
            format!("sqlite://{}", path.replace('\\', "/"))
        }
    }
}

fn sqlite_file(database_url: &str) -> Option<PathBuf> {
    let path = database_url.strip_prefix("sqlite://")?.split('?').next()?;
    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
