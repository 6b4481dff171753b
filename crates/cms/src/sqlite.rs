use std::str::FromStr;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, QueryBuilder, Row, Sqlite,
};
use tracing::debug;
use uuid::Uuid;

use shared::domain::{AUTHOR_TYPE, PLAYLIST_TYPE, STARTUP_TYPE};

use crate::{CmsError, ContentReader, ContentWriter, FetchMode, NewDocument, Patch, Query, Result};

const STARTUP_COLUMNS: &str = "s.id, s.title, s.description, s.category, s.image, s.slug, s.views, s.created_at, s.pitch, a.id, a.name, a.username, a.image, a.bio";

const AUTHOR_COLUMNS: &str = "id, external_id, name, username, email, image, bio";

/// Local content store with the same document shapes as the hosted backend.
/// Backs development setups and tests.
#[derive(Clone)]
pub struct SqliteCms {
    pool: Pool<Sqlite>,
}

impl SqliteCms {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn list_startups(&self, search: Option<&str>) -> Result<Value> {
        let pattern = search.map(word_prefix_pattern);
        let rows = sqlx::query(&format!(
            r"SELECT {STARTUP_COLUMNS}
              FROM startups s
              LEFT JOIN authors a ON a.id = s.author_id
              WHERE s.slug IS NOT NULL
                AND (?1 IS NULL
                     OR ' ' || lower(replace(s.title, '-', ' ')) LIKE ?1 ESCAPE '\'
                     OR ' ' || lower(replace(coalesce(s.category, ''), '-', ' ')) LIKE ?1 ESCAPE '\'
                     OR ' ' || lower(coalesce(a.name, '')) LIKE ?1 ESCAPE '\')
              ORDER BY s.created_at DESC, s.rowid DESC"
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(Value::Array(
            rows.iter().map(|row| startup_json(row, false)).collect(),
        ))
    }

    async fn startup_by_id(&self, id: &str) -> Result<Value> {
        let row = sqlx::query(&format!(
            "SELECT {STARTUP_COLUMNS}
             FROM startups s
             LEFT JOIN authors a ON a.id = s.author_id
             WHERE s.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| startup_json(&r, true)).unwrap_or(Value::Null))
    }

    async fn startup_views(&self, id: &str) -> Result<Value> {
        let row = sqlx::query("SELECT id, views FROM startups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| json!({ "_id": r.get::<String, _>(0), "views": r.get::<i64, _>(1) }))
            .unwrap_or(Value::Null))
    }

    async fn startups_by_author(&self, author_id: &str) -> Result<Value> {
        let rows = sqlx::query(&format!(
            "SELECT {STARTUP_COLUMNS}
             FROM startups s
             LEFT JOIN authors a ON a.id = s.author_id
             WHERE s.author_id = ?
             ORDER BY s.created_at DESC, s.rowid DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Value::Array(
            rows.iter().map(|row| startup_json(row, false)).collect(),
        ))
    }

    async fn author_where(&self, column: &str, value: &str) -> Result<Value> {
        let row = sqlx::query(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors WHERE {column} = ?"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(|r| {
                json!({
                    "_id": r.get::<String, _>(0),
                    "id": r.get::<Option<String>, _>(1),
                    "name": r.get::<Option<String>, _>(2),
                    "username": r.get::<Option<String>, _>(3),
                    "email": r.get::<Option<String>, _>(4),
                    "image": r.get::<Option<String>, _>(5),
                    "bio": r.get::<Option<String>, _>(6),
                })
            })
            .unwrap_or(Value::Null))
    }

    async fn playlist_by_slug(&self, slug: &str) -> Result<Value> {
        let Some(playlist) = sqlx::query("SELECT id, title, slug FROM playlists WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(Value::Null);
        };
        let playlist_id = playlist.get::<String, _>(0);

        // LEFT JOIN keeps dangling entries as nulls, matching `select[]->`.
        let rows = sqlx::query(&format!(
            "SELECT {STARTUP_COLUMNS}
             FROM playlist_entries e
             LEFT JOIN startups s ON s.id = e.startup_id
             LEFT JOIN authors a ON a.id = s.author_id
             WHERE e.playlist_id = ?
             ORDER BY e.position ASC"
        ))
        .bind(&playlist_id)
        .fetch_all(&self.pool)
        .await?;
        let select: Vec<Value> = rows
            .iter()
            .map(|row| match row.get::<Option<String>, _>(0) {
                Some(_) => startup_json(row, true),
                None => Value::Null,
            })
            .collect();

        Ok(json!({
            "_id": playlist_id,
            "title": playlist.get::<String, _>(1),
            "slug": playlist.get::<Option<String>, _>(2).map(slug_json),
            "select": select,
        }))
    }

    async fn insert_startup(&self, id: &str, created_at: &str, fields: &Map<String, Value>) -> Result<()> {
        let title = str_field(fields, "title")
            .ok_or_else(|| CmsError::Rejected("startup requires a title".into()))?;
        let views = match fields.get("views") {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_u64()
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| CmsError::Rejected("views must be a non-negative integer".into()))?,
        };
        sqlx::query(
            "INSERT INTO startups (id, title, description, category, image, slug, pitch, views, author_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(title)
        .bind(str_field(fields, "description"))
        .bind(str_field(fields, "category"))
        .bind(str_field(fields, "image"))
        .bind(nested_str(fields, "slug", "current"))
        .bind(str_field(fields, "pitch"))
        .bind(views)
        .bind(nested_str(fields, "author", "_ref"))
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_author(&self, id: &str, created_at: &str, fields: &Map<String, Value>) -> Result<()> {
        sqlx::query(
            "INSERT INTO authors (id, external_id, name, username, email, image, bio, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(str_field(fields, "id"))
        .bind(str_field(fields, "name"))
        .bind(str_field(fields, "username"))
        .bind(str_field(fields, "email"))
        .bind(str_field(fields, "image"))
        .bind(str_field(fields, "bio"))
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_playlist(&self, id: &str, created_at: &str, fields: &Map<String, Value>) -> Result<()> {
        let title = str_field(fields, "title")
            .ok_or_else(|| CmsError::Rejected("playlist requires a title".into()))?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO playlists (id, title, slug, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(title)
            .bind(nested_str(fields, "slug", "current"))
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        let entries = fields
            .get("select")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for (position, entry) in entries.iter().enumerate() {
            let target = entry
                .get("_ref")
                .and_then(Value::as_str)
                .ok_or_else(|| CmsError::Rejected("playlist entries must be references".into()))?;
            sqlx::query(
                "INSERT INTO playlist_entries (playlist_id, position, startup_id) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(target)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ContentReader for SqliteCms {
    async fn fetch(&self, query: &Query, mode: FetchMode) -> Result<Value> {
        debug!(query = query.name(), ?mode, "local content query");
        match query {
            Query::Startups { search } => {
                let search = search.as_deref().map(str::trim).filter(|s| !s.is_empty());
                self.list_startups(search).await
            }
            Query::StartupById { id } => self.startup_by_id(id.as_str()).await,
            Query::StartupViews { id } => self.startup_views(id.as_str()).await,
            Query::AuthorById { id } => self.author_where("id", id.as_str()).await,
            Query::AuthorByExternalId { id } => self.author_where("external_id", id).await,
            Query::StartupsByAuthor { id } => self.startups_by_author(id.as_str()).await,
            Query::PlaylistBySlug { slug } => self.playlist_by_slug(slug).await,
        }
    }
}

#[async_trait]
impl ContentWriter for SqliteCms {
    async fn create(&self, document: NewDocument) -> Result<Value> {
        let id = str_field(&document.fields, "_id").unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = str_field(&document.fields, "_createdAt")
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));

        match document.doc_type.as_str() {
            STARTUP_TYPE => self.insert_startup(&id, &created_at, &document.fields).await?,
            AUTHOR_TYPE => self.insert_author(&id, &created_at, &document.fields).await?,
            PLAYLIST_TYPE => self.insert_playlist(&id, &created_at, &document.fields).await?,
            other => return Err(CmsError::Rejected(format!("unknown document type '{other}'"))),
        }
        debug!(%id, doc_type = %document.doc_type, "local content create");

        let mut body = document.into_value();
        body["_id"] = Value::String(id);
        body["_createdAt"] = Value::String(created_at.clone());
        body["_updatedAt"] = Value::String(created_at);
        Ok(body)
    }

    async fn commit_patch(&self, patch: Patch) -> Result<Value> {
        if patch.set.is_empty() {
            return Err(CmsError::Rejected("patch sets no fields".into()));
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE startups SET ");
        {
            let mut columns = builder.separated(", ");
            for (field, value) in &patch.set {
                match field.as_str() {
                    "views" => {
                        let views = value
                            .as_u64()
                            .and_then(|v| i64::try_from(v).ok())
                            .ok_or_else(|| {
                                CmsError::Rejected("views must be a non-negative integer".into())
                            })?;
                        columns.push("views = ");
                        columns.push_bind_unseparated(views);
                    }
                    "title" | "description" | "category" | "image" | "pitch" => {
                        let text = match value {
                            Value::Null => None,
                            Value::String(text) => Some(text.clone()),
                            _ => {
                                return Err(CmsError::Rejected(format!("{field} must be a string")))
                            }
                        };
                        columns.push(format!("{field} = "));
                        columns.push_bind_unseparated(text);
                    }
                    other => {
                        return Err(CmsError::Rejected(format!("field '{other}' cannot be patched")))
                    }
                }
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(patch.id.clone());

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(CmsError::MissingDocument(patch.id));
        }
        debug!(id = %patch.id, "local content patch");
        self.startup_by_id(&patch.id).await
    }
}

fn startup_json(row: &SqliteRow, with_pitch: bool) -> Value {
    let author = row.get::<Option<String>, _>(9).map(|author_id| {
        json!({
            "_id": author_id,
            "name": row.get::<Option<String>, _>(10),
            "username": row.get::<Option<String>, _>(11),
            "image": row.get::<Option<String>, _>(12),
            "bio": row.get::<Option<String>, _>(13),
        })
    });
    let mut startup = json!({
        "_id": row.get::<String, _>(0),
        "title": row.get::<String, _>(1),
        "description": row.get::<Option<String>, _>(2),
        "category": row.get::<Option<String>, _>(3),
        "image": row.get::<Option<String>, _>(4),
        "slug": row.get::<Option<String>, _>(5).map(slug_json),
        "views": row.get::<i64, _>(6),
        "_createdAt": row.get::<String, _>(7),
        "author": author,
    });
    if with_pitch {
        startup["pitch"] = json!(row.get::<Option<String>, _>(8));
    }
    startup
}

fn slug_json(current: String) -> Value {
    json!({ "_type": "slug", "current": current })
}

fn str_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

fn nested_str(fields: &Map<String, Value>, name: &str, key: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// LIKE pattern matching `term` at the start of any space-separated word.
/// Folds ASCII only, like SQLite's `lower()` on the column side, so
/// non-ASCII letters compare as written.
fn word_prefix_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 4);
    for ch in term.to_ascii_lowercase().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("% {escaped}%")
}

#[cfg(test)]
#[path = "tests/sqlite_tests.rs"]
mod tests;
