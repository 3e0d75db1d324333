//! NFO sidecar files: the on-disk source of truth for human-entered
//! metadata, one `<name>.nfo` next to each tagged video.
//!
//! The schema is the small fixed home-video subset Jellyfin/Kodi read:
//! title, premiered (+derived year), rating, plot, actor list, tag list and
//! a constant `Home Video` genre. Parsing is regex-based and tolerant —
//! missing optional tags and garbage ratings degrade to `None` instead of
//! erroring, because these files are also hand-edited.

use std::path::{Component, Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use homereel_model::VideoMetadata;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum NfoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path escapes the media root: {0}")]
    PathOutsideRoot(PathBuf),
}

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<title>(.*?)</title>").unwrap());
static PREMIERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<premiered>(.*?)</premiered>").unwrap());
static RATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<rating>(.*?)</rating>").unwrap());
static PLOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<plot>(.*?)</plot>").unwrap());
static ACTOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<actor>(.*?)</actor>").unwrap());
static ACTOR_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<name>([^<]*)</name>").unwrap());
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<tag>(.*?)</tag>").unwrap());

/// Render metadata as NFO XML with the fixed tag order.
pub fn generate(metadata: &VideoMetadata) -> String {
    let mut lines = vec![
        r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
        "<movie>".to_string(),
        format!("  <title>{}</title>", escape_xml(&metadata.title)),
    ];

    if let Some(date) = metadata.date {
        lines.push(format!("  <premiered>{date}</premiered>"));
        lines.push(format!("  <year>{}</year>", date.year()));
    }

    if let Some(rating) = metadata.rating {
        lines.push(format!("  <rating>{rating}</rating>"));
    }

    if let Some(description) = metadata.description.as_deref() {
        lines.push(format!("  <plot>{}</plot>", escape_xml(description)));
    }

    for person in &metadata.people {
        lines.push("  <actor>".to_string());
        lines.push(format!("    <name>{}</name>", escape_xml(person)));
        lines.push("  </actor>".to_string());
    }

    for tag in &metadata.tags {
        lines.push(format!("  <tag>{}</tag>", escape_xml(tag)));
    }

    lines.push("  <genre>Home Video</genre>".to_string());
    lines.push("</movie>".to_string());

    lines.join("\n")
}

/// Extract metadata from NFO XML. Absent tags become `None`/empty; rating
/// strings that do not parse as an integer in 1-10 are dropped.
pub fn parse(xml: &str) -> VideoMetadata {
    let capture = |re: &Regex| {
        re.captures(xml)
            .map(|c| unescape_xml(c[1].trim()))
            .filter(|s| !s.is_empty())
    };

    let title = capture(&TITLE_RE).unwrap_or_default();
    let date = capture(&PREMIERED_RE)
        .and_then(|raw| raw.parse::<NaiveDate>().ok());
    let rating = capture(&RATING_RE)
        .and_then(|raw| raw.parse::<u8>().ok())
        .filter(|rating| (1..=10).contains(rating));
    let description = capture(&PLOT_RE);

    let people = ACTOR_RE
        .captures_iter(xml)
        .filter_map(|block| {
            ACTOR_NAME_RE
                .captures(&block[1])
                .map(|name| unescape_xml(name[1].trim()))
        })
        .filter(|name| !name.is_empty())
        .collect();

    let tags = TAG_RE
        .captures_iter(xml)
        .map(|c| unescape_xml(c[1].trim()))
        .filter(|tag| !tag.is_empty())
        .collect();

    VideoMetadata {
        title,
        date,
        people,
        tags,
        rating,
        description,
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

/// Sidecar access rooted at the media directory. Jellyfin reports paths
/// under its own mount of the shared volume; this remaps them onto ours and
/// refuses anything that resolves outside the root.
#[derive(Debug, Clone)]
pub struct NfoStore {
    media_root: PathBuf,
    jellyfin_prefix: PathBuf,
}

impl NfoStore {
    pub fn new(
        media_root: impl Into<PathBuf>,
        jellyfin_prefix: impl Into<PathBuf>,
    ) -> Self {
        Self {
            media_root: lexical_normalize(&media_root.into()),
            jellyfin_prefix: jellyfin_prefix.into(),
        }
    }

    /// Remap a Jellyfin-reported video path into the media root.
    pub fn map_to_local(&self, reported: &str) -> Result<PathBuf, NfoError> {
        let reported = Path::new(reported);

        let candidate = if reported.starts_with(&self.media_root) {
            reported.to_path_buf()
        } else if let Ok(rest) = reported.strip_prefix(&self.jellyfin_prefix)
        {
            self.media_root.join(rest)
        } else {
            warn!(path = %reported.display(), "path outside known mounts");
            reported.to_path_buf()
        };

        let resolved = lexical_normalize(&candidate);
        if resolved.starts_with(&self.media_root) {
            Ok(resolved)
        } else {
            Err(NfoError::PathOutsideRoot(resolved))
        }
    }

    /// Sidecar path for a video: same directory, `.nfo` extension.
    pub fn nfo_path(&self, video_path: &str) -> Result<PathBuf, NfoError> {
        Ok(self.map_to_local(video_path)?.with_extension("nfo"))
    }

    /// A video is tagged iff its sidecar exists. Unmappable paths count as
    /// untagged rather than failing a whole listing.
    pub fn is_tagged(&self, video_path: &str) -> bool {
        if video_path.is_empty() {
            return false;
        }
        match self.nfo_path(video_path) {
            Ok(path) => path.exists(),
            Err(_) => false,
        }
    }

    /// Atomic write: temp sibling then rename, so a concurrent Jellyfin
    /// scan never observes a half-written sidecar.
    pub async fn write(
        &self,
        video_path: &str,
        metadata: &VideoMetadata,
    ) -> Result<PathBuf, NfoError> {
        let nfo_path = self.nfo_path(video_path)?;
        let temp_path = nfo_path.with_extension("nfo.tmp");

        if let Some(parent) = nfo_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&temp_path, generate(metadata)).await?;
        tokio::fs::rename(&temp_path, &nfo_path).await?;

        debug!(path = %nfo_path.display(), "NFO written");
        Ok(nfo_path)
    }

    /// Read and parse an existing sidecar. Missing, unreadable or
    /// unmappable sidecars are `None`.
    pub async fn read(&self, video_path: &str) -> Option<VideoMetadata> {
        let nfo_path = self.nfo_path(video_path).ok()?;
        match tokio::fs::read_to_string(&nfo_path).await {
            Ok(content) => Some(parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %nfo_path.display(), error = %e, "NFO unreadable");
                None
            }
        }
    }
}

/// Component-wise normalization without touching the filesystem — the
/// target may not exist yet.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
