use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    #[default]
    Initial,
    Success,
    Error,
}

/// Uniform result of a server action: the payload's fields spread at the top
/// level next to `error` and `status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub error: String,
    pub status: ActionStatus,
    #[serde(
        rename = "fieldErrors",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub field_errors: BTreeMap<String, String>,
}

impl ActionState {
    pub fn success(payload: Map<String, Value>) -> Self {
        Self {
            payload,
            error: String::new(),
            status: ActionStatus::Success,
            field_errors: BTreeMap::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            payload: Map::new(),
            error: message.into(),
            status: ActionStatus::Error,
            field_errors: BTreeMap::new(),
        }
    }

    pub fn invalid(field_errors: BTreeMap<String, String>) -> Self {
        Self {
            field_errors,
            ..Self::error("Validation failed")
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }

    /// Reads a spread payload field, e.g. `_id` of a created document.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// Raw pitch form fields. The Markdown body travels separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePitchRequest {
    #[serde(flatten)]
    pub form: PitchForm,
    #[serde(default)]
    pub pitch: String,
}
