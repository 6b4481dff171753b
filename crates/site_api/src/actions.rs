use auth::{Credentials, Session};
use cms::{CmsError, NewDocument};
use serde_json::{json, Map, Value};
use shared::{
    domain::{AuthorId, Reference, Slug, AUTHOR_TYPE, STARTUP_TYPE},
    protocol::{ActionState, PitchForm},
};
use tracing::{info, warn};

use crate::{slug::slugify, validation::validate_pitch, ApiContext};

/// Creates a startup from a submitted pitch form.
///
/// Never fails: every outcome, including backend rejections, comes back as
/// an [`ActionState`]. Nothing is written until the caller is signed in and
/// the submission validates. A first-time author gets an author document
/// before the startup is created.
pub async fn create_pitch(
    ctx: &ApiContext,
    credentials: &Credentials,
    form: &PitchForm,
    pitch: &str,
) -> ActionState {
    let session = match ctx.sessions.current_session(credentials).await {
        Ok(Some(session)) => session,
        Ok(None) => return ActionState::error("Not signed in"),
        Err(error) => {
            warn!(%error, "session lookup failed");
            return ActionState::error(error.to_string());
        }
    };

    let valid = match validate_pitch(form, pitch) {
        Ok(valid) => valid,
        Err(field_errors) => return ActionState::invalid(field_errors),
    };

    if let Some(probe) = &ctx.image_probe {
        if !probe.is_image(&valid.link).await {
            let mut field_errors = crate::FieldErrors::new();
            field_errors.insert("link".into(), "URL must point to an image".into());
            return ActionState::invalid(field_errors);
        }
    }

    let author = match resolve_author(ctx, &session).await {
        Ok(author) => author,
        Err(error) => {
            warn!(%error, subject = %session.subject, "author lookup failed");
            return ActionState::error(error.to_string());
        }
    };

    let slug = slugify(&valid.title);
    let document = NewDocument::new(STARTUP_TYPE)
        .field("title", valid.title)
        .field("description", valid.description)
        .field("category", valid.category)
        .field("image", valid.link)
        .field("slug", json!(Slug::new(slug)))
        .field("author", json!(Reference::to(author.as_str())))
        .field("pitch", valid.pitch);

    match ctx.cms.create(document).await {
        Ok(Value::Object(created)) => {
            info!(id = ?created.get("_id"), %author, "pitch created");
            ActionState::success(created)
        }
        Ok(other) => {
            let mut payload = Map::new();
            payload.insert("document".into(), other);
            ActionState::success(payload)
        }
        Err(error) => {
            warn!(%error, %author, "pitch creation failed");
            ActionState::error(error.to_string())
        }
    }
}

/// Maps the session's subject onto its author document, creating one from
/// the session profile on first sign-in.
async fn resolve_author(ctx: &ApiContext, session: &Session) -> Result<AuthorId, CmsError> {
    if let Some(author) = ctx.cms.author_by_external_id(&session.subject).await? {
        return Ok(author.id);
    }

    let created = ctx
        .cms
        .create(
            NewDocument::new(AUTHOR_TYPE)
                .field("id", session.subject.as_str())
                .field("name", json!(session.name))
                .field("username", json!(session.username))
                .field("image", json!(session.image)),
        )
        .await?;
    let id = created
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| CmsError::Rejected("author create returned no id".into()))?;
    info!(author = id, subject = %session.subject, "author provisioned");
    Ok(AuthorId::new(id))
}

#[cfg(test)]
#[path = "tests/actions_tests.rs"]
mod tests;
