use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use homereel_core::jellyfin::JellyfinItem;
use homereel_model::{ApiSuccess, NowPlaying, Video, VideoMetadata};
use serde::Serialize;
use tracing::{info, warn};

use crate::{AppState, errors::AppError, errors::AppResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideosConfig {
    pub jellyfin_url: String,
    pub library_name: String,
}

fn video_from_item(state: &AppState, item: JellyfinItem) -> Video {
    let path = item.path.clone().unwrap_or_default();
    let is_tagged = state.nfo.is_tagged(&path);
    let thumbnail_url = item
        .has_primary_image()
        .then(|| format!("/videos/{}/thumbnail", item.id));
    let date_created = item.date_created_utc();
    let premiere_date = item.premiere_date_naive();

    Video {
        id: item.id,
        filename: item.name,
        path,
        is_tagged,
        thumbnail_url,
        date_created,
        premiere_date,
    }
}

/// All videos in the library, with tagged status derived from the
/// presence of an NFO sidecar next to each file.
pub async fn list_videos(
    State(state): State<AppState>,
) -> AppResult<Json<ApiSuccess<Vec<Video>>>> {
    let items = state.jellyfin.items().await?;
    let videos: Vec<Video> = items
        .into_iter()
        .map(|item| video_from_item(&state, item))
        .collect();

    let tagged = videos.iter().filter(|video| video.is_tagged).count();
    info!(total = videos.len(), tagged, "listed videos");

    let message = format!("Retrieved {} videos from Jellyfin", videos.len());
    Ok(Json(ApiSuccess::new(videos, message)))
}

/// Frontend configuration: where to link the Jellyfin web player.
pub async fn get_config(
    State(state): State<AppState>,
) -> Json<ApiSuccess<VideosConfig>> {
    let config = VideosConfig {
        jellyfin_url: state.jellyfin.base_url().to_string(),
        library_name: state.jellyfin.library_name().to_string(),
    };
    Json(ApiSuccess::new(config, "Video configuration retrieved"))
}

/// What the household user is currently watching. `data` is null both
/// when idle and when the poll fails — never an error for the caller.
pub async fn now_playing(
    State(state): State<AppState>,
) -> Json<ApiSuccess<Option<NowPlaying>>> {
    let playing = match state.config.jellyfin.now_playing_user.as_deref() {
        Some(username) => state.jellyfin.now_playing(username).await,
        None => None,
    };

    let message = match &playing {
        Some(item) => format!("Now playing: {}", item.name),
        None => "Nothing playing".to_string(),
    };
    Json(ApiSuccess::new(playing, message))
}

/// Current metadata for one video, read from its NFO sidecar. `data` is
/// null for an untagged video; 404 is reserved for unknown item ids.
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiSuccess<Option<VideoMetadata>>>> {
    let item = state.jellyfin.item(&id).await.ok_or_else(|| {
        AppError::not_found("Video not found", format!("No video with id {id}"))
    })?;

    let Some(path) = item.path.as_deref() else {
        return Ok(Json(ApiSuccess::new(
            None,
            "Video has no file path in Jellyfin",
        )));
    };

    let metadata = state.nfo.read(path).await;
    let message = if metadata.is_some() {
        "Metadata retrieved"
    } else {
        "Video is not tagged yet"
    };
    Ok(Json(ApiSuccess::new(metadata, message)))
}

/// Save metadata: validate, write the NFO sidecar atomically, mirror into
/// Jellyfin's item record, and ask Jellyfin to re-read the item. The NFO
/// is the source of truth — a failed mirror or refresh only logs.
pub async fn save_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(metadata): Json<VideoMetadata>,
) -> AppResult<Json<ApiSuccess<Video>>> {
    metadata.validate()?;

    let item = state.jellyfin.item(&id).await.ok_or_else(|| {
        AppError::not_found("Video not found", format!("No video with id {id}"))
    })?;
    let path = item.path.clone().ok_or_else(|| {
        AppError::internal(
            "Video has no path",
            "Jellyfin did not report a file path for this item.",
        )
    })?;

    state.nfo.write(&path, &metadata).await?;

    if !state.jellyfin.update_item_metadata(&id, &metadata).await {
        warn!(item = %id, "Jellyfin metadata mirror failed; NFO saved");
    }

    let jellyfin = state.jellyfin.clone();
    let item_id = id.clone();
    tokio::spawn(async move { jellyfin.refresh_item(&item_id).await });

    info!(item = %id, title = %metadata.title, "metadata saved");

    let video = video_from_item(&state, item);
    Ok(Json(ApiSuccess::new(
        video,
        format!("Metadata saved for \"{}\"", metadata.title),
    )))
}

/// Thumbnail proxy: serves Jellyfin's primary image without exposing the
/// API key to the browser.
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.jellyfin.thumbnail(&id).await {
        Some(bytes) => (
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            bytes,
        )
            .into_response(),
        None => AppError::not_found(
            "Thumbnail not found",
            format!("No primary image for video {id}"),
        )
        .into_response(),
    }
}
