//! Registry of content models reachable through detail permalinks.

use thiserror::Error;

/// Models the detail route knows how to load and render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentModel {
    Article,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("content type refers to unknown model `{model_name}`")]
pub struct UnknownModel {
    pub model_name: String,
}

impl ContentModel {
    /// Resolve the model named by a content type row.
    pub fn from_model_name(model_name: &str) -> Result<Self, UnknownModel> {
        match model_name.trim().to_ascii_lowercase().as_str() {
            "article" => Ok(ContentModel::Article),
            _ => Err(UnknownModel {
                model_name: model_name.to_string(),
            }),
        }
    }

    /// Identifier used in cache keys and template names.
    pub fn name(self) -> &'static str {
        match self {
            ContentModel::Article => "article",
        }
    }

    pub fn template_name(self) -> String {
        format!("content/{}_detail.html", self.name())
    }
}

/// Short codes are two word characters, compared case-insensitively.
pub fn normalize_short_code(code: &str) -> Option<String> {
    let valid = code.len() == 2 && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| code.to_ascii_lowercase())
}
