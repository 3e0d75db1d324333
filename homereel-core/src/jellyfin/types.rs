//! Wire types for the Jellyfin REST API (BaseItemDto subsets).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JellyfinUser {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageTags {
    #[serde(rename = "Primary", skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JellyfinItem {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "Type", default)]
    pub item_type: String,
    #[serde(rename = "ImageTags", default)]
    pub image_tags: ImageTags,
    /// ISO 8601, as reported by Jellyfin. Kept as a string on the wire and
    /// parsed leniently — Jellyfin emits seven fractional digits.
    #[serde(rename = "DateCreated", skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(rename = "PremiereDate", skip_serializing_if = "Option::is_none")]
    pub premiere_date: Option<String>,
}

impl JellyfinItem {
    pub fn has_primary_image(&self) -> bool {
        self.image_tags.primary.is_some()
    }

    pub fn date_created_utc(&self) -> Option<DateTime<Utc>> {
        self.date_created
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Date component of the premiere datetime. Jellyfin stores a full
    /// timestamp even when the NFO only carried a date.
    pub fn premiere_date_naive(&self) -> Option<NaiveDate> {
        let raw = self.premiere_date.as_deref()?;
        raw.get(..10)?.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsResponse {
    #[serde(rename = "Items", default)]
    pub items: Vec<JellyfinItem>,
    #[serde(rename = "TotalRecordCount", default)]
    pub total_record_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JellyfinLibrary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CollectionType", skip_serializing_if = "Option::is_none")]
    pub collection_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsResponse {
    #[serde(rename = "Items", default)]
    pub items: Vec<JellyfinLibrary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayState {
    #[serde(rename = "PositionTicks", skip_serializing_if = "Option::is_none")]
    pub position_ticks: Option<i64>,
    #[serde(rename = "IsPaused", skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JellyfinSession {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "UserName", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(rename = "DeviceName", skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(rename = "NowPlayingItem", skip_serializing_if = "Option::is_none")]
    pub now_playing_item: Option<JellyfinItem>,
    #[serde(rename = "PlayState", default)]
    pub play_state: PlayState,
}

/// Partial BaseItemDto for POST /Items/{id} — only the fields we update.
#[derive(Debug, Clone, Serialize)]
pub struct ItemUpdate {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "PremiereDate", skip_serializing_if = "Option::is_none")]
    pub premiere_date: Option<String>,
    #[serde(rename = "Overview", skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(rename = "Tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "People", skip_serializing_if = "Option::is_none")]
    pub people: Option<Vec<PersonUpdate>>,
    #[serde(rename = "CommunityRating", skip_serializing_if = "Option::is_none")]
    pub community_rating: Option<f32>,
    #[serde(rename = "Genres")]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonUpdate {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub person_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_item_with_jellyfin_timestamps() {
        let raw = r#"{
            "Id": "abc",
            "Name": "beach.mp4",
            "Path": "/home-videos/beach.mp4",
            "Type": "Video",
            "ImageTags": {"Primary": "tag1"},
            "DateCreated": "2024-03-01T10:30:00.0000000Z",
            "PremiereDate": "2023-06-01T12:00:00-05:00"
        }"#;
        let item: JellyfinItem = serde_json::from_str(raw).unwrap();
        assert!(item.has_primary_image());
        assert_eq!(
            item.premiere_date_naive(),
            Some(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap())
        );
        assert_eq!(
            item.date_created_utc().unwrap().to_rfc3339(),
            "2024-03-01T10:30:00+00:00"
        );
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let item: JellyfinItem =
            serde_json::from_str(r#"{"Id": "x", "Name": "clip"}"#).unwrap();
        assert!(!item.has_primary_image());
        assert!(item.path.is_none());
        assert!(item.premiere_date_naive().is_none());
    }

    #[test]
    fn item_update_skips_unset_fields() {
        let update = ItemUpdate {
            id: "abc".into(),
            name: Some("Beach Day".into()),
            premiere_date: None,
            overview: None,
            tags: None,
            people: None,
            community_rating: None,
            genres: vec!["Home Video".into()],
        };
        let rendered = serde_json::to_value(&update).unwrap();
        assert_eq!(rendered["Name"], "Beach Day");
        assert_eq!(rendered["Genres"][0], "Home Video");
        assert!(rendered.get("Overview").is_none());
    }
}
