use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use homereel_config::Config;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::{AppState, handlers::upload, handlers::videos};

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    // Body limits leave headroom over the configured payload caps for
    // multipart framing.
    let slack: usize = 1024 * 1024;
    let video_limit = state.config.upload.max_video_bytes() as usize + slack;
    let dvd_limit = state.config.upload.max_dvd_bytes() as usize + slack;

    Router::new()
        .merge(video_routes())
        .merge(upload_routes(video_limit, dvd_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn video_routes() -> Router<AppState> {
    Router::new()
        .route("/videos", get(videos::list_videos))
        .route("/videos/config", get(videos::get_config))
        .route("/videos/now-playing", get(videos::now_playing))
        .route(
            "/videos/{id}/metadata",
            get(videos::get_metadata).post(videos::save_metadata),
        )
        .route("/videos/{id}/thumbnail", get(videos::get_thumbnail))
}

fn upload_routes(video_limit: usize, dvd_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/upload/config", get(upload::get_config))
        .route("/upload/dvd/{job_id}/status", get(upload::dvd_status))
        .route(
            "/upload/video",
            post(upload::upload_video)
                .layer(DefaultBodyLimit::max(video_limit)),
        )
        .route(
            "/upload/dvd",
            post(upload::upload_dvd).layer(DefaultBodyLimit::max(dvd_limit)),
        )
        .route(
            "/upload/dvd-folder",
            post(upload::upload_dvd_folder)
                .layer(DefaultBodyLimit::max(dvd_limit)),
        )
}

fn cors_layer(config: &Config) -> CorsLayer {
    match config.server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
        Err(e) => {
            warn!(origin = %config.server.cors_origin, error = %e, "invalid CORS origin, denying cross-origin requests");
            CorsLayer::new()
        }
    }
}
