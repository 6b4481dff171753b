//! Page composition and server actions for the pitch directory.
//!
//! Everything here talks to the content backend and the session provider
//! through [`ApiContext`], so tests can substitute either collaborator.

use std::sync::Arc;

use auth::SessionProvider;
use cms::{CmsClient, CmsError};
use shared::error::{ApiError, ErrorCode};

mod actions;
mod deferred;
mod markdown;
mod pages;
mod slug;
mod validation;
mod views;

pub use actions::create_pitch;
pub use deferred::DeferredWork;
pub use markdown::render_markdown;
pub use pages::{
    detail_page, list_page, profile_page, DetailPage, ListPage, ProfilePage, NO_DETAILS,
};
pub use slug::slugify;
pub use validation::{validate_pitch, FieldErrors, HttpImageProbe, ImageProbe, ValidPitch};
pub use views::{ViewCount, ViewCounter};

pub const DEFAULT_EDITOR_PICKS_SLUG: &str = "editor-picks-new";

#[derive(Clone)]
pub struct ApiContext {
    pub cms: CmsClient,
    pub sessions: Arc<dyn SessionProvider>,
    pub editor_picks_slug: String,
    /// When set, submitted image links must answer with an `image/*` type.
    pub image_probe: Option<Arc<dyn ImageProbe>>,
}

impl ApiContext {
    pub fn new(cms: CmsClient, sessions: Arc<dyn SessionProvider>) -> Self {
        Self {
            cms,
            sessions,
            editor_picks_slug: DEFAULT_EDITOR_PICKS_SLUG.to_string(),
            image_probe: None,
        }
    }
}

fn upstream(err: CmsError) -> ApiError {
    ApiError::new(ErrorCode::Upstream, err.to_string())
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
