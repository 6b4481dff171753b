//! Named read queries against the content backend.
//!
//! Each query carries the GROQ text the hosted backend evaluates and the
//! parameters bound into it. The local store dispatches on the variant
//! instead of parsing the text.

use serde_json::{Map, Value};
use shared::domain::{AuthorId, StartupId};

pub const STARTUPS_QUERY: &str = r#"*[_type == "startup" && defined(slug.current) && (!defined($search) || title match $search || category match $search || author->name match $search)] | order(_createdAt desc) {
  _id, title, slug, _createdAt,
  author -> { _id, name, image, bio },
  views, description, category, image
}"#;

pub const STARTUP_BY_ID_QUERY: &str = r#"*[_type == "startup" && _id == $id][0] {
  _id, title, slug, _createdAt,
  author -> { _id, name, username, image, bio },
  views, description, category, image, pitch
}"#;

pub const STARTUP_VIEWS_QUERY: &str = r#"*[_type == "startup" && _id == $id][0] {
  _id, views
}"#;

pub const AUTHOR_BY_ID_QUERY: &str = r#"*[_type == "author" && _id == $id][0] {
  _id, id, name, username, email, image, bio
}"#;

pub const AUTHOR_BY_EXTERNAL_ID_QUERY: &str = r#"*[_type == "author" && id == $id][0] {
  _id, id, name, username, email, image, bio
}"#;

pub const STARTUPS_BY_AUTHOR_QUERY: &str = r#"*[_type == "startup" && author._ref == $id] | order(_createdAt desc) {
  _id, title, slug, _createdAt,
  author -> { _id, name, image, bio },
  views, description, category, image
}"#;

pub const PLAYLIST_BY_SLUG_QUERY: &str = r#"*[_type == "playlist" && slug.current == $slug][0] {
  _id, title, slug,
  select[] -> {
    _id, _createdAt, title, slug,
    author -> { _id, name, slug, image, bio },
    views, description, category, image, pitch
  }
}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Startups { search: Option<String> },
    StartupById { id: StartupId },
    StartupViews { id: StartupId },
    AuthorById { id: AuthorId },
    AuthorByExternalId { id: String },
    StartupsByAuthor { id: AuthorId },
    PlaylistBySlug { slug: String },
}

impl Query {
    pub fn name(&self) -> &'static str {
        match self {
            Query::Startups { .. } => "startups",
            Query::StartupById { .. } => "startup_by_id",
            Query::StartupViews { .. } => "startup_views",
            Query::AuthorById { .. } => "author_by_id",
            Query::AuthorByExternalId { .. } => "author_by_external_id",
            Query::StartupsByAuthor { .. } => "startups_by_author",
            Query::PlaylistBySlug { .. } => "playlist_by_slug",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Query::Startups { .. } => STARTUPS_QUERY,
            Query::StartupById { .. } => STARTUP_BY_ID_QUERY,
            Query::StartupViews { .. } => STARTUP_VIEWS_QUERY,
            Query::AuthorById { .. } => AUTHOR_BY_ID_QUERY,
            Query::AuthorByExternalId { .. } => AUTHOR_BY_EXTERNAL_ID_QUERY,
            Query::StartupsByAuthor { .. } => STARTUPS_BY_AUTHOR_QUERY,
            Query::PlaylistBySlug { .. } => PLAYLIST_BY_SLUG_QUERY,
        }
    }

    /// Parameters bound as `$name` in [`Query::text`].
    pub fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            Query::Startups { search } => {
                let search = search
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .unwrap_or(Value::Null);
                params.insert("search".into(), search);
            }
            Query::StartupById { id } | Query::StartupViews { id } => {
                params.insert("id".into(), Value::String(id.0.clone()));
            }
            Query::AuthorById { id } | Query::StartupsByAuthor { id } => {
                params.insert("id".into(), Value::String(id.0.clone()));
            }
            Query::AuthorByExternalId { id } => {
                params.insert("id".into(), Value::String(id.clone()));
            }
            Query::PlaylistBySlug { slug } => {
                params.insert("slug".into(), Value::String(slug.clone()));
            }
        }
        params
    }
}

#[cfg(test)]
#[path = "tests/queries_tests.rs"]
mod tests;
