use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// A video as surfaced to the frontend. Sourced from Jellyfin on every
/// listing; never persisted by this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// Jellyfin item id.
    pub id: String,
    pub filename: String,
    pub path: String,
    /// Derived: an NFO sidecar exists next to the video file.
    pub is_tagged: bool,
    /// Proxied thumbnail path (`/videos/{id}/thumbnail`), never the raw
    /// Jellyfin URL — the API key stays server-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premiere_date: Option<NaiveDate>,
}

/// Human-entered metadata for one video. Persisted as an NFO sidecar and
/// mirrored into Jellyfin's own item metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VideoMetadata {
    /// Boundary validation: a non-empty title and a 1-10 rating. Everything
    /// else is free-form.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if let Some(rating) = self.rating
            && !(1..=10).contains(&rating)
        {
            return Err(ValidationError::RatingOutOfRange(rating));
        }
        Ok(())
    }
}

/// Returned once per upload call; the stored file itself is the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
}

/// The item currently streaming for the configured household user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_ticks: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> VideoMetadata {
        VideoMetadata {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_title_is_rejected() {
        assert!(matches!(
            titled("").validate(),
            Err(ValidationError::EmptyTitle)
        ));
        assert!(matches!(
            titled("   ").validate(),
            Err(ValidationError::EmptyTitle)
        ));
        assert!(titled("Beach Day").validate().is_ok());
    }

    #[test]
    fn rating_bounds() {
        let mut meta = titled("Beach Day");
        meta.rating = Some(0);
        assert!(matches!(
            meta.validate(),
            Err(ValidationError::RatingOutOfRange(0))
        ));
        meta.rating = Some(11);
        assert!(meta.validate().is_err());
        meta.rating = Some(10);
        assert!(meta.validate().is_ok());
        meta.rating = None;
        assert!(meta.validate().is_ok());
    }
}
