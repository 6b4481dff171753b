use cms::Patch;
use shared::{domain::StartupId, error::ApiError};
use tracing::{debug, warn};

use crate::{deferred::DeferredWork, upstream, ApiContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewCount(pub u64);

impl ViewCount {
    pub fn label(&self) -> String {
        match self.0 {
            0 => "No views".to_string(),
            1 => "1 view".to_string(),
            n => format!("{n} views"),
        }
    }
}

/// Live view counter for one startup. Mounted by the detail page and
/// resolved separately so it never holds up the rest of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCounter {
    pub id: StartupId,
}

impl ViewCounter {
    pub fn new(id: StartupId) -> Self {
        Self { id }
    }

    /// Reads the current count, bypassing any cache, and schedules the
    /// increment on `deferred`.
    ///
    /// The increment writes `observed + 1` without a compare-and-swap, so
    /// concurrent views of one startup can overwrite each other. The count
    /// is display-only and that loss is accepted.
    pub async fn resolve(
        &self,
        ctx: &ApiContext,
        deferred: &DeferredWork,
    ) -> Result<ViewCount, ApiError> {
        let observed = ctx
            .cms
            .startup_views(&self.id)
            .await
            .map_err(upstream)?
            .ok_or_else(|| ApiError::not_found("startup not found"))?
            .views;

        let cms = ctx.cms.clone();
        let id = self.id.clone();
        deferred.schedule(async move {
            match cms.commit(Patch::new(id.as_str()).set("views", observed + 1)).await {
                Ok(_) => debug!(%id, views = observed + 1, "view count incremented"),
                Err(error) => warn!(%id, %error, "view count increment failed"),
            }
        });

        Ok(ViewCount(observed))
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
