use shared::{
    domain::{Author, AuthorId, Startup, StartupId},
    error::ApiError,
};

use crate::{markdown::render_markdown, upstream, views::ViewCounter, ApiContext};

pub const NO_DETAILS: &str = "No details provided";

#[derive(Debug, Clone)]
pub struct DetailPage {
    pub startup: Startup,
    /// Rendered pitch body; `None` when the startup has no pitch.
    pub pitch_html: Option<String>,
    /// Empty when there is nothing to show, in which case the section is
    /// omitted rather than rendered as an empty state.
    pub editor_picks: Vec<Startup>,
    pub views: ViewCounter,
}

#[derive(Debug, Clone)]
pub struct ListPage {
    pub query: Option<String>,
    pub startups: Vec<Startup>,
}

impl ListPage {
    pub fn heading(&self) -> String {
        match self.query.as_deref() {
            Some(query) => format!("Search results for \"{query}\""),
            None => "All Startups".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.startups.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ProfilePage {
    pub author: Author,
    pub startups: Vec<Startup>,
}

/// Loads the startup and the editor picks side by side; both must succeed
/// before anything renders.
pub async fn detail_page(ctx: &ApiContext, id: &StartupId) -> Result<DetailPage, ApiError> {
    let (startup, picks) = tokio::try_join!(
        async { ctx.cms.startup_by_id(id).await.map_err(upstream) },
        async {
            ctx.cms
                .playlist_by_slug(&ctx.editor_picks_slug)
                .await
                .map_err(upstream)
        },
    )?;
    let startup = startup.ok_or_else(|| ApiError::not_found("startup not found"))?;

    let pitch_html = startup.pitch.as_deref().and_then(render_markdown);
    let editor_picks = picks.map(|playlist| playlist.select).unwrap_or_default();

    Ok(DetailPage {
        views: ViewCounter::new(startup.id.clone()),
        startup,
        pitch_html,
        editor_picks,
    })
}

/// Matching is entirely up to the content backend.
pub async fn list_page(ctx: &ApiContext, query: Option<&str>) -> Result<ListPage, ApiError> {
    let query = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);
    let startups = ctx
        .cms
        .startups(query.as_deref())
        .await
        .map_err(upstream)?;
    Ok(ListPage { query, startups })
}

pub async fn profile_page(ctx: &ApiContext, id: &AuthorId) -> Result<ProfilePage, ApiError> {
    let author = ctx
        .cms
        .author_by_id(id)
        .await
        .map_err(upstream)?
        .ok_or_else(|| ApiError::not_found("author not found"))?;
    let startups = ctx
        .cms
        .startups_by_author(&author.id)
        .await
        .map_err(upstream)?;
    Ok(ProfilePage { author, startups })
}

#[cfg(test)]
#[path = "tests/pages_tests.rs"]
mod tests;
