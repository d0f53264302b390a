//! Image library rules: storage paths and MIME detection.

use serde::Deserialize;
use time::{OffsetDateTime, macros::format_description};

use crate::domain::entities::ImageRecord;
use crate::domain::error::DomainError;
use crate::domain::slug::resolve_content_slug;
use crate::domain::types::CropDirection;

/// Raster formats the library recognises; anything else is treated as JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Gif,
    Png,
}

impl ImageFormat {
    pub fn from_path(path: &str) -> Self {
        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "gif" => ImageFormat::Gif,
            "png" => ImageFormat::Png,
            _ => ImageFormat::Jpeg,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Png => "image/png",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Png => "PNG",
        }
    }
}

impl ImageRecord {
    pub fn format(&self) -> ImageFormat {
        ImageFormat::from_path(&self.file_path)
    }
}

/// Relative storage path for an uploaded file, bucketed by upload day.
pub fn upload_path(filename: &str, uploaded_at: OffsetDateTime) -> Result<String, DomainError> {
    let filename = filename.trim().to_lowercase();
    if filename.is_empty() || filename.contains('/') || filename.contains("..") {
        return Err(DomainError::validation(format!(
            "`{filename}` is not a valid image filename"
        )));
    }
    let day = uploaded_at
        .format(format_description!("[year]/[month]/[day]"))
        .map_err(|err| DomainError::invariant(err.to_string()))?;
    Ok(format!("images/{day}/{filename}"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageDraft {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub crop_direction: CropDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedImage {
    pub title: String,
    pub slug: String,
    pub file_path: String,
    pub crop_direction: CropDirection,
}

impl ImageDraft {
    pub fn validate(self, now: OffsetDateTime) -> Result<ValidatedImage, DomainError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("Images must have a title."));
        }
        let slug = resolve_content_slug(self.slug.as_deref(), &title)
            .map_err(|err| DomainError::validation(err.to_string()))?;
        let file_path = upload_path(&self.filename, now)?;
        Ok(ValidatedImage {
            title,
            slug,
            file_path,
            crop_direction: self.crop_direction,
        })
    }
}
