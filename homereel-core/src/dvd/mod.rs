//! DVD chapter extraction: lsdvd chapter analysis, per-chapter ffmpeg
//! cuts, and the background job manager that makes the whole pipeline
//! pollable instead of blocking an upload request for many minutes.

pub mod extract;
pub mod jobs;
pub mod lsdvd;

pub use jobs::{ExtractionManager, SpooledDvdFile};

use crate::external::ToolError;
use crate::upload::UploadError;

#[derive(Debug, thiserror::Error)]
pub enum DvdError {
    #[error("VIDEO_TS folder not found")]
    MissingVideoTs,

    #[error("could not find chapter info in DVD structure")]
    UnparseableChapters,

    #[error("no chapters found in DVD")]
    NoChapters,

    #[error("no VOB files found in VIDEO_TS")]
    NoVobFiles,

    #[error("invalid DVD folder structure: missing required VOB/IFO files")]
    InvalidFolder,

    #[error("chapter {chapter} produced an invalid file ({size} bytes)")]
    StubOutput { chapter: u32, size: u64 },

    #[error("failed to extract any chapters from DVD")]
    AllChaptersFailed,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
