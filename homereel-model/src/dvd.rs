use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One chapter of a DVD title, derived from lsdvd output for a single
/// extraction run. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DvdChapter {
    pub index: u32,
    /// Seconds.
    pub duration: f64,
    /// Seconds from the start of the title, cumulative over chapters.
    pub start_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Analyzing,
    Extracting,
    Complete,
    Error,
}

impl ExtractionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Pollable progress of one extraction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionProgress {
    pub job_id: Uuid,
    pub status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chapters: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_chapter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_filename: Option<String>,
    #[serde(default)]
    pub extracted_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExtractionProgress {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: ExtractionStatus::Analyzing,
            total_chapters: None,
            current_chapter: None,
            current_filename: None,
            extracted_files: Vec::new(),
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}
