//! Thin REST wrapper over the Jellyfin HTTP API.
//!
//! Calls the caller cannot proceed without (user resolution, item listing)
//! surface failures as [`JellyfinError`]. Best-effort side calls (refreshes,
//! thumbnails, session polls, single-item lookups) log a warning and return
//! a `None`/`false` fallback instead — their failures must never fail the
//! operation that triggered them.

pub mod types;

use std::fmt;
use std::time::Duration;

use homereel_config::JellyfinConfig;
use homereel_model::{NowPlaying, VideoMetadata};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub use types::{ItemsResponse, JellyfinItem, JellyfinLibrary, JellyfinUser};

use types::{ItemUpdate, JellyfinSession, PersonUpdate, ViewsResponse};

#[derive(Debug, thiserror::Error)]
pub enum JellyfinError {
    #[error("Jellyfin API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("no users found in Jellyfin")]
    NoUsers,
}

impl JellyfinError {
    /// Authentication failures get a dedicated HTTP mapping upstream.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }

    pub fn is_connection(&self) -> bool {
        match self {
            Self::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Images and session polls are decorative; give up sooner.
const SHORT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct JellyfinClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    library_name: String,
    library_id: RwLock<Option<String>>,
}

impl fmt::Debug for JellyfinClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JellyfinClient")
            .field("base_url", &self.base_url)
            .field("library_name", &self.library_name)
            .finish_non_exhaustive()
    }
}

impl JellyfinClient {
    pub fn new(config: &JellyfinConfig) -> Result<Self, JellyfinError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
            library_name: config.library_name.clone(),
            library_id: RwLock::new(None),
        })
    }

    /// Base URL for constructing web-player links on the frontend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn library_name(&self) -> &str {
        &self.library_name
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, JellyfinError> {
        let response = self
            .http
            .get(self.url(path))
            .header("X-Emby-Token", &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JellyfinError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// First user on the server — single-user household assumption.
    pub async fn first_user_id(&self) -> Result<String, JellyfinError> {
        let users: Vec<JellyfinUser> = self.get_json("/Users", &[]).await?;
        let first = users.into_iter().next().ok_or(JellyfinError::NoUsers)?;
        debug!(user = %first.name, "resolved Jellyfin user");
        Ok(first.id)
    }

    /// Resolve the configured library's id from the user's views. Cached
    /// after the first successful lookup. `None` (with a warning listing
    /// what exists) when no view carries the configured name.
    pub async fn library_id(&self) -> Result<Option<String>, JellyfinError> {
        if let Some(id) = self.library_id.read().await.clone() {
            return Ok(Some(id));
        }

        let user_id = self.first_user_id().await?;
        let views: ViewsResponse = self
            .get_json(&format!("/Users/{user_id}/Views"), &[])
            .await?;

        let Some(library) = views
            .items
            .iter()
            .find(|library| library.name == self.library_name)
        else {
            let available: Vec<&str> =
                views.items.iter().map(|l| l.name.as_str()).collect();
            warn!(
                library = %self.library_name,
                ?available,
                "library not found in Jellyfin views"
            );
            return Ok(None);
        };

        debug!(library = %self.library_name, id = %library.id, "resolved library");
        *self.library_id.write().await = Some(library.id.clone());
        Ok(Some(library.id.clone()))
    }

    /// All video items, filtered to the configured library when it can be
    /// resolved (unfiltered with a warning otherwise), sorted by name.
    pub async fn items(&self) -> Result<Vec<JellyfinItem>, JellyfinError> {
        let user_id = self.first_user_id().await?;
        let library_id = self.library_id().await?;

        let mut query = vec![
            ("IncludeItemTypes", "Video"),
            ("Recursive", "true"),
            ("Fields", "Path,ImageTags,DateCreated,PremiereDate"),
            ("SortBy", "SortName"),
            ("SortOrder", "Ascending"),
        ];
        if let Some(id) = library_id.as_deref() {
            query.push(("ParentId", id));
        } else {
            warn!("library filter unavailable, listing all videos");
        }

        let response: ItemsResponse = self
            .get_json(&format!("/Users/{user_id}/Items"), &query)
            .await?;
        debug!(count = response.items.len(), "retrieved Jellyfin items");
        Ok(response.items)
    }

    /// Single item lookup. Best-effort: any failure is logged and maps to
    /// `None`, which callers report as an unknown item.
    pub async fn item(&self, item_id: &str) -> Option<JellyfinItem> {
        let user_id = match self.first_user_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(item = item_id, error = %e, "user lookup failed");
                return None;
            }
        };

        match self
            .get_json(&format!("/Users/{user_id}/Items/{item_id}"), &[])
            .await
        {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(item = item_id, error = %e, "item fetch failed");
                None
            }
        }
    }

    /// Primary image bytes for the proxy endpoint. Best-effort.
    pub async fn thumbnail(&self, item_id: &str) -> Option<Vec<u8>> {
        let result = self
            .http
            .get(self.url(&format!("/Items/{item_id}/Images/Primary")))
            .header("X-Emby-Token", &self.api_key)
            .timeout(SHORT_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                response.bytes().await.ok().map(|bytes| bytes.to_vec())
            }
            Ok(response) => {
                warn!(
                    item = item_id,
                    status = response.status().as_u16(),
                    "thumbnail fetch failed"
                );
                None
            }
            Err(e) => {
                warn!(item = item_id, error = %e, "thumbnail fetch failed");
                None
            }
        }
    }

    /// Mirror saved metadata into Jellyfin's own item record, bypassing its
    /// NFO re-parse. Returns false (logged) on any failure — the NFO on
    /// disk stays the source of truth either way.
    pub async fn update_item_metadata(
        &self,
        item_id: &str,
        metadata: &VideoMetadata,
    ) -> bool {
        let update = ItemUpdate {
            id: item_id.to_string(),
            name: Some(metadata.title.clone()),
            // Noon Eastern: a bare date would be read as UTC midnight and
            // shift back a day for household timezones.
            premiere_date: metadata
                .date
                .map(|date| format!("{date}T12:00:00-05:00")),
            overview: metadata.description.clone(),
            tags: (!metadata.tags.is_empty()).then(|| metadata.tags.clone()),
            people: (!metadata.people.is_empty()).then(|| {
                metadata
                    .people
                    .iter()
                    .map(|name| PersonUpdate {
                        name: name.clone(),
                        person_type: "Actor".to_string(),
                    })
                    .collect()
            }),
            community_rating: metadata.rating.map(f32::from),
            genres: vec!["Home Video".to_string()],
        };

        let result = self
            .http
            .post(self.url(&format!("/Items/{item_id}")))
            .header("X-Emby-Token", &self.api_key)
            .json(&update)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(item = item_id, "Jellyfin item metadata updated");
                true
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                warn!(item = item_id, status, body, "item update rejected");
                false
            }
            Err(e) => {
                warn!(item = item_id, error = %e, "item update failed");
                false
            }
        }
    }

    /// Full-server rescan. Best-effort.
    pub async fn refresh_library(&self) {
        self.post_refresh("/Library/Refresh", &[]).await;
    }

    /// Rescan only the configured library with a full metadata refresh so
    /// freshly written NFO files are picked up. Falls back to a full-server
    /// refresh when the library id cannot be resolved. Best-effort.
    pub async fn refresh_home_library(&self) {
        match self.library_id().await {
            Ok(Some(id)) => {
                self.post_refresh(
                    &format!("/Items/{id}/Refresh"),
                    &[
                        ("MetadataRefreshMode", "FullRefresh"),
                        ("ImageRefreshMode", "Default"),
                        ("ReplaceAllMetadata", "false"),
                    ],
                )
                .await;
            }
            Ok(None) => {
                warn!("library not found, falling back to full refresh");
                self.refresh_library().await;
            }
            Err(e) => warn!(error = %e, "library refresh skipped"),
        }
    }

    /// Re-read one item's metadata from disk. Best-effort.
    pub async fn refresh_item(&self, item_id: &str) {
        self.post_refresh(
            &format!("/Items/{item_id}/Refresh"),
            &[
                ("MetadataRefreshMode", "FullRefresh"),
                ("ImageRefreshMode", "Default"),
                ("ReplaceAllMetadata", "true"),
            ],
        )
        .await;
    }

    async fn post_refresh(&self, path: &str, query: &[(&str, &str)]) {
        let result = self
            .http
            .post(self.url(path))
            .header("X-Emby-Token", &self.api_key)
            .query(query)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(path, "refresh triggered");
            }
            Ok(response) => {
                warn!(path, status = response.status().as_u16(), "refresh rejected");
            }
            Err(e) => warn!(path, error = %e, "refresh failed"),
        }
    }

    /// What the given user is currently streaming, from the sessions list.
    /// Best-effort: `None` both for "nothing playing" and on poll failure.
    pub async fn now_playing(&self, username: &str) -> Option<NowPlaying> {
        let result = self
            .http
            .get(self.url("/Sessions"))
            .header("X-Emby-Token", &self.api_key)
            .timeout(SHORT_TIMEOUT)
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "sessions poll failed");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "sessions poll failed");
                return None;
            }
        };

        let sessions: Vec<JellyfinSession> = match response.json().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "sessions response unparseable");
                return None;
            }
        };

        let session = sessions.into_iter().find(|session| {
            session
                .user_name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(username))
                && session.now_playing_item.is_some()
        })?;

        let item = session.now_playing_item?;
        debug!(user = username, item = %item.name, "now playing");
        Some(NowPlaying {
            id: item.id,
            name: item.name,
            device_name: session.device_name,
            is_paused: session.play_state.is_paused,
            position_ticks: session.play_state.position_ticks,
        })
    }
}
