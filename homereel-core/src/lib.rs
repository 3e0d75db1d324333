//! # Homereel Core
//!
//! Engine crate for the Homereel media cataloger:
//!
//! - **Jellyfin client**: thin REST wrapper over the household Jellyfin
//!   server (users, items, sessions, images, metadata updates, refreshes)
//! - **NFO sidecars**: generate/parse the fixed home-video NFO schema with
//!   atomic writes next to the media files
//! - **Uploads**: collision-safe storage of new videos under the media root
//! - **DVD pipeline**: chapter extraction from VIDEO_TS structures via
//!   lsdvd and ffmpeg, run as pollable background jobs

pub mod dvd;
pub mod external;
pub mod jellyfin;
pub mod nfo;
pub mod upload;

pub use dvd::{DvdError, ExtractionManager};
pub use external::ToolError;
pub use jellyfin::{JellyfinClient, JellyfinError};
pub use nfo::{NfoError, NfoStore};
pub use upload::{UploadError, UploadService};
