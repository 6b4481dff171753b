use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use shared::protocol::PitchForm;
use url::Url;

use crate::slug::slugify;

pub type FieldErrors = BTreeMap<String, String>;

const TITLE_LEN: (usize, usize) = (3, 100);
const DESCRIPTION_LEN: (usize, usize) = (20, 500);
const CATEGORY_LEN: (usize, usize) = (3, 20);
const PITCH_MIN_LEN: usize = 10;

/// A submission that passed every check, with fields trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPitch {
    pub title: String,
    pub description: String,
    pub category: String,
    pub link: String,
    pub pitch: String,
}

/// Checks that a submitted link actually serves an image.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn is_image(&self, url: &str) -> bool;
}

/// Issues a `HEAD` request and inspects `content-type`.
#[derive(Clone, Default)]
pub struct HttpImageProbe {
    http: Client,
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn is_image(&self, url: &str) -> bool {
        let Ok(response) = self.http.head(url).send().await else {
            return false;
        };
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("image/"))
    }
}

pub fn validate_pitch(form: &PitchForm, pitch: &str) -> Result<ValidPitch, FieldErrors> {
    let mut errors = FieldErrors::new();

    let title = form.title.trim();
    check_length(&mut errors, "title", "Title", title, TITLE_LEN);
    if !errors.contains_key("title") && slugify(title).is_empty() {
        errors.insert(
            "title".into(),
            "Title must contain at least one letter or digit".into(),
        );
    }

    let description = form.description.trim();
    check_length(
        &mut errors,
        "description",
        "Description",
        description,
        DESCRIPTION_LEN,
    );

    let category = form.category.trim();
    check_length(&mut errors, "category", "Category", category, CATEGORY_LEN);

    let link = form.link.trim();
    if link.is_empty() {
        errors.insert("link".into(), "Image URL is required".into());
    } else if !is_web_url(link) {
        errors.insert("link".into(), "Image URL must be a valid http(s) URL".into());
    }

    let pitch = pitch.trim();
    if pitch.is_empty() {
        errors.insert("pitch".into(), "Pitch is required".into());
    } else if pitch.chars().count() < PITCH_MIN_LEN {
        errors.insert(
            "pitch".into(),
            format!("Pitch must be at least {PITCH_MIN_LEN} characters"),
        );
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(ValidPitch {
        title: title.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        link: link.to_string(),
        pitch: pitch.to_string(),
    })
}

fn check_length(
    errors: &mut FieldErrors,
    field: &str,
    label: &str,
    value: &str,
    (min, max): (usize, usize),
) {
    let len = value.chars().count();
    let message = if len == 0 {
        format!("{label} is required")
    } else if len < min {
        format!("{label} must be at least {min} characters")
    } else if len > max {
        format!("{label} must be at most {max} characters")
    } else {
        return;
    };
    errors.insert(field.to_string(), message);
}

fn is_web_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
