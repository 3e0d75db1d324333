//! Core data model definitions shared across Homereel crates.
#![allow(missing_docs)]

pub mod api;
pub mod dvd;
pub mod error;
pub mod video;

pub use api::{ApiError, ApiSuccess};
pub use dvd::{DvdChapter, ExtractionProgress, ExtractionStatus};
pub use error::{Result as ModelResult, ValidationError};
pub use video::{NowPlaying, UploadResult, Video, VideoMetadata};
