//! # Homereel Server
//!
//! HTTP API for the Homereel family media cataloger.
//!
//! ## Overview
//!
//! - **Video listing**: home videos from the household Jellyfin server,
//!   each annotated with whether an NFO sidecar tags it yet
//! - **Tagging**: metadata saves write NFO sidecars next to the media
//!   files and mirror into Jellyfin's own item records
//! - **Uploads**: new video files stored under the media root with
//!   collision-safe names
//! - **DVD ingestion**: ripped VIDEO_TS structures (ZIP or folder upload)
//!   split into per-chapter MP4s by lsdvd + ffmpeg, as pollable
//!   background jobs

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use errors::{AppError, AppResult};
pub use infra::AppState;
pub use routes::create_router;
